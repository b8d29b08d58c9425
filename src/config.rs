//! Environment-driven settings. CLI flags override these.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use chrono_tz::Tz;

use crate::prepare::DEFAULT_TIMEZONE;

/// Mannheim, Germany.
pub const DEFAULT_LATITUDE: f64 = 49.4875;
pub const DEFAULT_LONGITUDE: f64 = 8.4660;
pub const DEFAULT_BUCKET: &str = "weather-data";
pub const DEFAULT_OBJECT_KEY: &str = "weather_backup.csv";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: Tz,
    pub bucket: String,
    pub object_key: String,
    /// Topic ARN for announcements; none disables publishing.
    pub topic: Option<String>,
}

impl Settings {
    /// Reads `WEATHER_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let latitude = match lookup("WEATHER_LATITUDE") {
            Some(v) => v.parse().with_context(|| format!("WEATHER_LATITUDE={v}"))?,
            None => DEFAULT_LATITUDE,
        };
        let longitude = match lookup("WEATHER_LONGITUDE") {
            Some(v) => v.parse().with_context(|| format!("WEATHER_LONGITUDE={v}"))?,
            None => DEFAULT_LONGITUDE,
        };
        let timezone = match lookup("WEATHER_TIMEZONE") {
            Some(v) => v
                .parse::<Tz>()
                .map_err(|e| anyhow::anyhow!("WEATHER_TIMEZONE={v}: {e}"))?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Self {
            latitude,
            longitude,
            timezone,
            bucket: lookup("WEATHER_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            object_key: lookup("WEATHER_OBJECT_KEY")
                .unwrap_or_else(|| DEFAULT_OBJECT_KEY.to_string()),
            topic: lookup("WEATHER_TOPIC_ARN").filter(|t| !t.is_empty()),
        })
    }
}

/// Jan 1 of the current year up to yesterday. On Jan 1 itself the whole
/// previous year is used.
pub fn default_date_range(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = today.pred_opt().unwrap_or(today);
    let start = NaiveDate::from_ymd_opt(end.year(), 1, 1).unwrap_or(end);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s.latitude, DEFAULT_LATITUDE);
        assert_eq!(s.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(s.bucket, DEFAULT_BUCKET);
        assert_eq!(s.object_key, DEFAULT_OBJECT_KEY);
        assert_eq!(s.topic, None);
    }

    #[test]
    fn test_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("WEATHER_LATITUDE", "52.52"),
            ("WEATHER_TIMEZONE", "UTC"),
            ("WEATHER_TOPIC_ARN", "arn:aws:sns:eu-central-1:123:weather"),
        ]))
        .unwrap();
        assert_eq!(s.latitude, 52.52);
        assert_eq!(s.timezone, chrono_tz::UTC);
        assert_eq!(s.topic.as_deref(), Some("arn:aws:sns:eu-central-1:123:weather"));
    }

    #[test]
    fn test_bad_values_are_errors() {
        assert!(Settings::from_lookup(lookup(&[("WEATHER_LONGITUDE", "east")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("WEATHER_TIMEZONE", "Mars/Base")])).is_err());
    }

    #[test]
    fn test_empty_topic_disables_publishing() {
        let s = Settings::from_lookup(lookup(&[("WEATHER_TOPIC_ARN", "")])).unwrap();
        assert_eq!(s.topic, None);
    }

    #[test]
    fn test_default_date_range() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(default_date_range(d(2024, 6, 15)), (d(2024, 1, 1), d(2024, 6, 14)));
        assert_eq!(default_date_range(d(2025, 1, 1)), (d(2024, 1, 1), d(2024, 12, 31)));
    }
}
