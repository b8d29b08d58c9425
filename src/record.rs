//! Hourly observation types shared by ingest and dashboard.

use std::fmt;
use std::str::FromStr;

/// The five hourly variables requested from the archive API, in CSV column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    Temperature,
    SoilTemperature,
    SoilMoisture,
    DewPoint,
    RelativeHumidity,
}

impl Measurement {
    pub const ALL: [Measurement; 5] = [
        Measurement::Temperature,
        Measurement::SoilTemperature,
        Measurement::SoilMoisture,
        Measurement::DewPoint,
        Measurement::RelativeHumidity,
    ];

    /// Column / API variable name.
    pub fn column(self) -> &'static str {
        match self {
            Measurement::Temperature => "temperature_2m",
            Measurement::SoilTemperature => "soil_temperature_0_to_7cm",
            Measurement::SoilMoisture => "soil_moisture_0_to_7cm",
            Measurement::DewPoint => "dew_point_2m",
            Measurement::RelativeHumidity => "relative_humidity_2m",
        }
    }

    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.column() == name)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Measurement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_column(s).ok_or_else(|| {
            let known: Vec<_> = Self::ALL.iter().map(|m| m.column()).collect();
            format!("unknown measurement '{s}', expected one of {}", known.join(", "))
        })
    }
}

/// One hourly observation. `timestamp` is kept as the source text; the
/// preparer turns it into an instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherRecord {
    pub timestamp: String,
    pub temperature_2m: Option<f64>,
    pub soil_temperature_0_to_7cm: Option<f64>,
    pub soil_moisture_0_to_7cm: Option<f64>,
    pub dew_point_2m: Option<f64>,
    pub relative_humidity_2m: Option<f64>,
}

impl WeatherRecord {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            ..Default::default()
        }
    }

    pub fn with(mut self, m: Measurement, value: Option<f64>) -> Self {
        self.set(m, value);
        self
    }

    pub fn get(&self, m: Measurement) -> Option<f64> {
        match m {
            Measurement::Temperature => self.temperature_2m,
            Measurement::SoilTemperature => self.soil_temperature_0_to_7cm,
            Measurement::SoilMoisture => self.soil_moisture_0_to_7cm,
            Measurement::DewPoint => self.dew_point_2m,
            Measurement::RelativeHumidity => self.relative_humidity_2m,
        }
    }

    pub fn set(&mut self, m: Measurement, value: Option<f64>) {
        let slot = match m {
            Measurement::Temperature => &mut self.temperature_2m,
            Measurement::SoilTemperature => &mut self.soil_temperature_0_to_7cm,
            Measurement::SoilMoisture => &mut self.soil_moisture_0_to_7cm,
            Measurement::DewPoint => &mut self.dew_point_2m,
            Measurement::RelativeHumidity => &mut self.relative_humidity_2m,
        };
        *slot = value;
    }

    /// True when every measurement is null.
    pub fn is_empty(&self) -> bool {
        Measurement::ALL.iter().all(|m| self.get(*m).is_none())
    }

    /// Both headline fields present.
    pub fn is_complete(&self) -> bool {
        self.temperature_2m.is_some() && self.soil_moisture_0_to_7cm.is_some()
    }
}

/// Ordered hourly records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherSeries {
    records: Vec<WeatherRecord>,
}

impl WeatherSeries {
    pub fn new(records: Vec<WeatherRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[WeatherRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WeatherRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<WeatherRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a WeatherSeries {
    type Item = &'a WeatherRecord;
    type IntoIter = std::slice::Iter<'a, WeatherRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_columns_round_trip() {
        for m in Measurement::ALL {
            assert_eq!(Measurement::from_column(m.column()), Some(m));
        }
        assert_eq!(Measurement::from_column("wind_speed_10m"), None);
    }

    #[test]
    fn test_measurement_from_str_lists_known_columns() {
        let err = "rain".parse::<Measurement>().unwrap_err();
        assert!(err.contains("temperature_2m"));
        assert_eq!(
            "dew_point_2m".parse::<Measurement>().unwrap(),
            Measurement::DewPoint
        );
    }

    #[test]
    fn test_is_empty_and_complete() {
        let empty = WeatherRecord::new("2024-01-01T00:00");
        assert!(empty.is_empty());
        assert!(!empty.is_complete());

        let partial = empty.clone().with(Measurement::DewPoint, Some(-1.5));
        assert!(!partial.is_empty());
        assert!(!partial.is_complete());

        let complete = partial
            .with(Measurement::Temperature, Some(4.0))
            .with(Measurement::SoilMoisture, Some(0.31));
        assert!(complete.is_complete());
    }
}
