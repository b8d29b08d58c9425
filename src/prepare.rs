//! Turns a normalized series into dashboard-ready data.
//!
//! Preparation parses every timestamp, sorts the records chronologically,
//! derives the trailing 24-hour temperature mean and picks the record the
//! headline metrics are taken from.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::record::{WeatherRecord, WeatherSeries};

/// Number of records in the trailing temperature window.
pub const ROLLING_WINDOW: usize = 24;

/// Zone used for naive timestamps; the ingest request asks the API for it.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a time value into an instant.
///
/// Values carrying an offset keep it. Naive values are read as local time in
/// `tz`; during a DST fall-back the earlier instant wins, and local times
/// skipped by a spring-forward are rejected.
pub fn parse_timestamp(value: &str, tz: Tz) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();

    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t);
    }
    // chrono's `%:z` does not take a `Z` designator
    let utc = value.strip_suffix(['Z', 'z']).map(|rest| format!("{rest}+00:00"));
    let with_offset = utc.as_deref().unwrap_or(value);
    if let Some(t) = OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::parse_from_str(with_offset, f).ok())
    {
        return Some(t);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|t| t.fixed_offset())
}

/// Trailing mean over `window` positions ending at each index.
///
/// Nulls are left out of both sum and count; a window with no values yields
/// null rather than zero.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let (sum, count) = values[start..=i]
                .iter()
                .flatten()
                .fold((0.0_f64, 0usize), |(sum, count), v| (sum + v, count + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

/// A record after preparation: parsed instant plus the derived column.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecord {
    pub time: DateTime<FixedOffset>,
    pub record: WeatherRecord,
    pub temp_rolling_24h: Option<f64>,
}

/// How the headline record was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Latest record with temperature and soil moisture both present.
    Complete,
    /// No such record; the latest record overall was used instead.
    IncompleteData,
}

/// Headline values, already formatted for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Headline {
    pub temperature: String,
    pub soil_moisture: String,
    pub record_count: usize,
}

/// Result of [`prepare`]: the derived series and the headline selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    records: Vec<PreparedRecord>,
    latest: usize,
    selection: Selection,
}

impl Prepared {
    /// Records in ascending time order.
    pub fn records(&self) -> &[PreparedRecord] {
        &self.records
    }

    /// The latest complete record (or the fallback, see [`Prepared::selection`]).
    pub fn latest(&self) -> &PreparedRecord {
        &self.records[self.latest]
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Derived rolling-mean column, aligned with [`Prepared::records`].
    pub fn rolling(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.temp_rolling_24h).collect()
    }

    pub fn headline(&self) -> Headline {
        let latest = &self.latest().record;
        Headline {
            temperature: format_temperature(latest.temperature_2m),
            soil_moisture: format_soil_moisture(latest.soil_moisture_0_to_7cm),
            record_count: self.records.len(),
        }
    }

    /// The sorted records without the derived column, as if freshly loaded.
    pub fn to_series(&self) -> WeatherSeries {
        WeatherSeries::new(self.records.iter().map(|r| r.record.clone()).collect())
    }
}

pub fn format_temperature(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1} °C"))
}

pub fn format_soil_moisture(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

/// Prepares `series`, reading naive timestamps in [`DEFAULT_TIMEZONE`].
pub fn prepare(series: &WeatherSeries) -> Result<Prepared> {
    prepare_in(series, DEFAULT_TIMEZONE)
}

/// Prepares `series`, reading naive timestamps in `tz`.
///
/// # Errors
///
/// [`PipelineError::InvalidTimestamp`] for the first unparseable time value,
/// [`PipelineError::MalformedInput`] for an empty series.
pub fn prepare_in(series: &WeatherSeries, tz: Tz) -> Result<Prepared> {
    if series.is_empty() {
        return Err(PipelineError::malformed("series has no records to prepare"));
    }

    let mut records = series
        .iter()
        .enumerate()
        .map(|(position, record)| {
            let time = parse_timestamp(&record.timestamp, tz).ok_or_else(|| {
                PipelineError::InvalidTimestamp {
                    position,
                    value: record.timestamp.clone(),
                }
            })?;
            Ok(PreparedRecord {
                time,
                record: record.clone(),
                temp_rolling_24h: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // stable: equal instants keep input order
    records.sort_by_key(|r| r.time);

    let temps: Vec<Option<f64>> = records.iter().map(|r| r.record.temperature_2m).collect();
    for (r, mean) in records.iter_mut().zip(rolling_mean(&temps, ROLLING_WINDOW)) {
        r.temp_rolling_24h = mean;
    }

    let (latest, selection) = match records.iter().rposition(|r| r.record.is_complete()) {
        Some(idx) => (idx, Selection::Complete),
        None => {
            warn!(
                records = records.len(),
                "No complete row found for headline metrics, using the latest row"
            );
            (records.len() - 1, Selection::IncompleteData)
        }
    };

    debug!(records = records.len(), latest, ?selection, "Prepared series");

    Ok(Prepared {
        records,
        latest,
        selection,
    })
}
