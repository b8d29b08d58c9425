//! Client for the Open-Meteo ERA5 archive.
//!
//! The archive answers with column arrays under an `hourly` envelope:
//!
//! ```json
//! { "hourly": { "time": ["2024-01-01T00:00", ...], "temperature_2m": [5.1, null, ...], ... } }
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, info};

use super::{BasicClient, HttpClient, fetch_bytes};
use crate::error::{PipelineError, Result};
use crate::record::{Measurement, WeatherRecord};

pub const ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/era5";

/// Parameters of one archive query.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub variables: Vec<Measurement>,
    pub timezone: Tz,
}

impl HourlyRequest {
    /// Query URL against `base` (normally [`ARCHIVE_URL`]).
    pub fn url(&self, base: &str) -> String {
        let hourly: Vec<&str> = self.variables.iter().map(|m| m.column()).collect();
        format!(
            "{}?latitude={}&longitude={}&start_date={}&end_date={}&hourly={}&timezone={}",
            base,
            self.latitude,
            self.longitude,
            self.start_date.format("%Y-%m-%d"),
            self.end_date.format("%Y-%m-%d"),
            hourly.join(","),
            self.timezone.name(),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: Option<Hourly>,
}

/// Column arrays of the `hourly` envelope; unrequested variables stay `None`.
#[derive(Debug, Deserialize)]
struct Hourly {
    time: Option<Vec<String>>,
    temperature_2m: Option<Vec<Option<f64>>>,
    soil_temperature_0_to_7cm: Option<Vec<Option<f64>>>,
    soil_moisture_0_to_7cm: Option<Vec<Option<f64>>>,
    dew_point_2m: Option<Vec<Option<f64>>>,
    relative_humidity_2m: Option<Vec<Option<f64>>>,
}

impl Hourly {
    fn column(&self, m: Measurement) -> Option<&[Option<f64>]> {
        let column = match m {
            Measurement::Temperature => &self.temperature_2m,
            Measurement::SoilTemperature => &self.soil_temperature_0_to_7cm,
            Measurement::SoilMoisture => &self.soil_moisture_0_to_7cm,
            Measurement::DewPoint => &self.dew_point_2m,
            Measurement::RelativeHumidity => &self.relative_humidity_2m,
        };
        column.as_deref()
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    reason: String,
}

/// Source of raw hourly records.
#[async_trait]
pub trait WeatherApi: Send + Sync {
    async fn fetch_hourly(&self, req: &HourlyRequest) -> Result<Vec<WeatherRecord>>;
}

pub struct OpenMeteoClient<C = BasicClient> {
    http: C,
    base_url: String,
}

impl<C: HttpClient> OpenMeteoClient<C> {
    pub fn new(http: C) -> Self {
        Self {
            http,
            base_url: ARCHIVE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl<C: HttpClient> WeatherApi for OpenMeteoClient<C> {
    #[tracing::instrument(skip(self, req), fields(start = %req.start_date, end = %req.end_date))]
    async fn fetch_hourly(&self, req: &HourlyRequest) -> Result<Vec<WeatherRecord>> {
        let url = req.url(&self.base_url);
        debug!(url = %url, "Requesting hourly archive");

        let (status, body) = fetch_bytes(&self.http, &url)
            .await
            .map_err(|e| PipelineError::collaborator("weather API", e))?;

        if !status.is_success() {
            let reason = serde_json::from_slice::<ApiError>(&body)
                .map(|e| e.reason)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            return Err(PipelineError::malformed(format!(
                "weather API returned status {status}: {reason}"
            )));
        }

        let records = parse_hourly(&body, &req.variables)?;
        info!(records = records.len(), bytes = body.len(), "Hourly archive fetched");
        Ok(records)
    }
}

/// Decodes an archive response body into one record per hour.
///
/// # Errors
///
/// [`PipelineError::MalformedInput`] when the body is not JSON, lacks the
/// `hourly` envelope, the `time` array or any requested variable, holds a
/// non-numeric value, or has arrays of different lengths.
pub fn parse_hourly(body: &[u8], variables: &[Measurement]) -> Result<Vec<WeatherRecord>> {
    let response: ArchiveResponse = serde_json::from_slice(body)
        .map_err(|e| PipelineError::malformed(format!("response is not archive JSON: {e}")))?;

    let hourly = response
        .hourly
        .ok_or_else(|| PipelineError::malformed("response has no 'hourly' object"))?;

    let mut records: Vec<WeatherRecord> = hourly
        .time
        .as_deref()
        .ok_or_else(|| PipelineError::malformed("'hourly' has no 'time' array"))?
        .iter()
        .map(WeatherRecord::new)
        .collect();

    for &m in variables {
        let column = hourly
            .column(m)
            .ok_or_else(|| PipelineError::malformed(format!("'hourly' has no '{m}' array")))?;

        if column.len() != records.len() {
            return Err(PipelineError::malformed(format!(
                "'hourly.{m}' has {} values for {} timestamps",
                column.len(),
                records.len()
            )));
        }

        for (record, &value) in records.iter_mut().zip(column) {
            record.set(m, value);
        }
    }

    Ok(records)
}
