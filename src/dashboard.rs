//! Terminal dashboard over the CSV backup.
//!
//! [`DashboardState`] is passed explicitly into every load/render call. It
//! owns the data-source choice, memoized downloads keyed by `(bucket, key)`
//! and the table currently on screen.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use bytes::Bytes;
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::normalize::normalize;
use crate::parser::{RawTable, parse_table};
use crate::prepare::{Prepared, Selection, prepare_in};
use crate::record::Measurement;
use crate::store::{ObjectStore, decode_body};

/// Rows of the raw table shown before any preparation.
pub const RAW_PREVIEW_ROWS: usize = 5;
/// Rows in the recent-events table.
pub const DEFAULT_RECENT_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Remote { bucket: String, key: String },
    Local(PathBuf),
}

pub struct DashboardState {
    source: DataSource,
    timezone: Tz,
    cache: HashMap<(String, String), Bytes>,
    table: Option<RawTable>,
}

impl DashboardState {
    pub fn new(source: DataSource, timezone: Tz) -> Self {
        Self {
            source,
            timezone,
            cache: HashMap::new(),
            table: None,
        }
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    /// Switches the data source. The loaded table is cleared, cached
    /// downloads are kept.
    pub fn set_source(&mut self, source: DataSource) {
        if source != self.source {
            self.table = None;
        }
        self.source = source;
    }

    pub fn table(&self) -> Option<&RawTable> {
        self.table.as_ref()
    }

    pub fn is_cached(&self, bucket: &str, key: &str) -> bool {
        self.cache
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub fn invalidate(&mut self, bucket: &str, key: &str) {
        self.cache.remove(&(bucket.to_string(), key.to_string()));
    }

    /// Loads the table from the current source.
    ///
    /// Remote objects are downloaded only when not cached or when `reload` is
    /// set. A failed load leaves the previously loaded table in place.
    pub async fn load(&mut self, store: &dyn ObjectStore, reload: bool) -> Result<&RawTable> {
        let bytes = match &self.source {
            DataSource::Remote { bucket, key } => {
                let cache_key = (bucket.clone(), key.clone());
                if reload {
                    self.cache.remove(&cache_key);
                }
                match self.cache.get(&cache_key) {
                    Some(body) => {
                        debug!(bucket = %bucket, key = %key, "Using cached download");
                        body.clone()
                    }
                    None => {
                        let body = store
                            .download(bucket, key)
                            .await
                            .and_then(|body| decode_body(key, body))
                            .map_err(|e| PipelineError::collaborator("object store", e))?;
                        info!(bucket = %bucket, key = %key, bytes = body.len(), "Data loaded from object store");
                        self.cache.insert(cache_key, body.clone());
                        body
                    }
                }
            }
            DataSource::Local(path) => {
                let data = tokio::fs::read(path).await.map_err(|e| {
                    PipelineError::collaborator("local file", anyhow::Error::new(e))
                })?;
                info!(path = %path.display(), bytes = data.len(), "Data loaded from local file");
                Bytes::from(data)
            }
        };

        let table = parse_table(&bytes)?;
        Ok(&*self.table.insert(table))
    }

    /// Builds the view of the loaded table; `None` when nothing is loaded.
    pub fn view(&self) -> Result<Option<DashboardView<'_>>> {
        self.table
            .as_ref()
            .map(|t| build_view(t, self.timezone))
            .transpose()
    }
}

/// What the dashboard shows for one table.
#[derive(Debug)]
pub struct DashboardView<'a> {
    pub raw: &'a RawTable,
    /// `None` when the table has no time column: only the raw table is shown.
    pub prepared: Option<Prepared>,
}

/// Prepares `table` for display, or falls back to raw-only when it has no
/// time column.
pub fn build_view(table: &RawTable, timezone: Tz) -> Result<DashboardView<'_>> {
    if table.time_column().is_none() {
        warn!("No 'timestamp' or 'time' column, showing the raw table only");
        return Ok(DashboardView {
            raw: table,
            prepared: None,
        });
    }

    let series = normalize(table.to_records()?);
    let prepared = prepare_in(&series, timezone)?;
    Ok(DashboardView {
        raw: table,
        prepared: Some(prepared),
    })
}

/// Min / max / mean of one measurement over the prepared series.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub metric: Measurement,
    pub count: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

pub fn summarize(prepared: &Prepared, metric: Measurement) -> MetricSummary {
    let values: Vec<f64> = prepared
        .records()
        .iter()
        .filter_map(|r| r.record.get(metric))
        .collect();

    let count = values.len();
    MetricSummary {
        metric,
        count,
        min: values.iter().copied().reduce(f64::min),
        max: values.iter().copied().reduce(f64::max),
        mean: (count > 0).then(|| values.iter().sum::<f64>() / count as f64),
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub metric: Measurement,
    pub recent_rows: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            metric: Measurement::Temperature,
            recent_rows: DEFAULT_RECENT_ROWS,
        }
    }
}

fn opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.decimals$}"))
}

fn write_table<W: Write>(out: &mut W, headers: &[String], rows: &[Vec<String>]) -> io::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, &w)| format!("{c:>w$}"))
            .collect::<Vec<_>>()
            .join("  ")
    };

    writeln!(out, "{}", line(headers))?;
    for row in rows {
        writeln!(out, "{}", line(row))?;
    }
    Ok(())
}

/// Renders `view` as plain text.
pub fn render<W: Write>(view: &DashboardView<'_>, options: &RenderOptions, out: &mut W) -> io::Result<()> {
    writeln!(out, "== Raw Weather Data ==")?;
    let preview: Vec<Vec<String>> = view
        .raw
        .rows()
        .iter()
        .take(RAW_PREVIEW_ROWS)
        .map(|r| r.iter().map(str::to_string).collect())
        .collect();
    write_table(out, view.raw.headers(), &preview)?;
    writeln!(out)?;

    let Some(prepared) = &view.prepared else {
        writeln!(
            out,
            "WARNING: No 'time' column found! Please load a valid weather CSV."
        )?;
        return Ok(());
    };

    let headline = prepared.headline();
    writeln!(out, "Latest Temperature:   {}", headline.temperature)?;
    writeln!(out, "Latest Soil Moisture: {}", headline.soil_moisture)?;
    writeln!(out, "Records Ingested:     {}", headline.record_count)?;
    if prepared.selection() == Selection::IncompleteData {
        writeln!(
            out,
            "WARNING: No complete row found for KPIs! Check your data for missing values."
        )?;
    }
    writeln!(out)?;

    writeln!(out, "== Latest Row Details ==")?;
    let latest = prepared.latest();
    writeln!(out, "{:>26}: {}", "time", latest.time.format("%Y-%m-%d %H:%M %:z"))?;
    for m in Measurement::ALL {
        writeln!(out, "{:>26}: {}", m.column(), opt(latest.record.get(m), 3))?;
    }
    writeln!(out, "{:>26}: {}", "temp_rolling_24h", opt(latest.temp_rolling_24h, 3))?;
    writeln!(out)?;

    let summary = summarize(prepared, options.metric);
    writeln!(out, "== Compare Metrics: {} ==", summary.metric)?;
    writeln!(
        out,
        "values {}  min {}  max {}  mean {}",
        summary.count,
        opt(summary.min, 2),
        opt(summary.max, 2),
        opt(summary.mean, 2)
    )?;
    writeln!(out)?;

    writeln!(out, "== Recent Weather Events ==")?;
    let mut headers = vec!["time".to_string()];
    headers.extend(Measurement::ALL.iter().map(|m| m.column().to_string()));
    headers.push("temp_rolling_24h".to_string());

    let records = prepared.records();
    let recent: Vec<Vec<String>> = records[records.len().saturating_sub(options.recent_rows)..]
        .iter()
        .map(|r| {
            let mut row = vec![r.time.format("%Y-%m-%d %H:%M").to_string()];
            row.extend(Measurement::ALL.iter().map(|m| opt(r.record.get(*m), 2)));
            row.push(opt(r.temp_rolling_24h, 2));
            row
        })
        .collect();
    write_table(out, &headers, &recent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prepare::{DEFAULT_TIMEZONE, prepare};
    use crate::record::{WeatherRecord, WeatherSeries};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CSV: &str = "time,temperature_2m,soil_moisture_0_to_7cm\n\
                       2024-01-01T00:00,5.0,0.3\n\
                       2024-01-01T01:00,,\n\
                       2024-01-01T02:00,7.0,0.4\n";

    struct CountingStore {
        body: Bytes,
        downloads: AtomicUsize,
    }

    impl CountingStore {
        fn new(body: &'static str) -> Self {
            Self {
                body: Bytes::from_static(body.as_bytes()),
                downloads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ObjectStore for CountingStore {
        async fn download(&self, _bucket: &str, _key: &str) -> anyhow::Result<Bytes> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }

        async fn upload(&self, _bucket: &str, _key: &str, _body: Bytes) -> anyhow::Result<()> {
            anyhow::bail!("read-only")
        }
    }

    fn remote() -> DataSource {
        DataSource::Remote {
            bucket: "weather".to_string(),
            key: "weather_backup.csv".to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_is_memoized_until_reload() {
        let store = CountingStore::new(CSV);
        let mut state = DashboardState::new(remote(), DEFAULT_TIMEZONE);

        state.load(&store, false).await.unwrap();
        state.load(&store, false).await.unwrap();
        assert_eq!(store.downloads.load(Ordering::SeqCst), 1);
        assert!(state.is_cached("weather", "weather_backup.csv"));

        state.load(&store, true).await.unwrap();
        assert_eq!(store.downloads.load(Ordering::SeqCst), 2);

        state.invalidate("weather", "weather_backup.csv");
        assert!(!state.is_cached("weather", "weather_backup.csv"));
    }

    #[tokio::test]
    async fn test_switching_source_clears_table() {
        let store = CountingStore::new(CSV);
        let mut state = DashboardState::new(remote(), DEFAULT_TIMEZONE);
        state.load(&store, false).await.unwrap();
        assert!(state.table().is_some());

        state.set_source(DataSource::Local(PathBuf::from("upload.csv")));
        assert!(state.table().is_none());
        assert!(state.view().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_local_load_is_collaborator_failure() {
        let store = CountingStore::new(CSV);
        let mut state = DashboardState::new(
            DataSource::Local(PathBuf::from("/nonexistent/weather.csv")),
            DEFAULT_TIMEZONE,
        );
        assert!(matches!(
            state.load(&store, false).await,
            Err(PipelineError::CollaboratorFailure { .. })
        ));
    }

    #[test]
    fn test_view_headline() {
        let table = parse_table(CSV.as_bytes()).unwrap();
        let view = build_view(&table, DEFAULT_TIMEZONE).unwrap();
        let prepared = view.prepared.as_ref().unwrap();

        assert_eq!(prepared.headline().temperature, "7.0 °C");
        assert_eq!(prepared.headline().record_count, 2);
    }

    #[test]
    fn test_raw_only_without_time_column() {
        let table = parse_table(b"temperature_2m\n1.0\n2.0\n").unwrap();
        let view = build_view(&table, DEFAULT_TIMEZONE).unwrap();
        assert!(view.prepared.is_none());

        let mut out = Vec::new();
        render(&view, &RenderOptions::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("No 'time' column found"));
        assert!(!text.contains("Latest Temperature"));
    }

    #[test]
    fn test_render_full_view() {
        let table = parse_table(CSV.as_bytes()).unwrap();
        let view = build_view(&table, DEFAULT_TIMEZONE).unwrap();

        let mut out = Vec::new();
        render(&view, &RenderOptions::default(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Latest Temperature:   7.0 °C"));
        assert!(text.contains("Latest Soil Moisture: 0.40"));
        assert!(text.contains("Records Ingested:     2"));
        assert!(!text.contains("WARNING"));
        assert!(text.contains("2024-01-01 02:00"));
    }

    #[test]
    fn test_render_warns_on_incomplete_data() {
        let csv = "time,temperature_2m\n2024-01-01T00:00,1.0\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        let view = build_view(&table, DEFAULT_TIMEZONE).unwrap();

        let mut out = Vec::new();
        render(&view, &RenderOptions::default(), &mut out).unwrap();

        assert!(String::from_utf8(out).unwrap().contains("No complete row found"));
    }

    #[test]
    fn test_summarize_ignores_nulls() {
        let series = WeatherSeries::new(vec![
            WeatherRecord::new("2024-01-01T00:00").with(Measurement::DewPoint, Some(1.0)),
            WeatherRecord::new("2024-01-01T01:00").with(Measurement::Temperature, Some(9.0)),
            WeatherRecord::new("2024-01-01T02:00").with(Measurement::DewPoint, Some(3.0)),
        ]);
        let prepared = prepare(&series).unwrap();

        let summary = summarize(&prepared, Measurement::DewPoint);

        assert_eq!(summary.count, 2);
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(3.0));
        assert_eq!(summary.mean, Some(2.0));
        assert_eq!(summarize(&prepared, Measurement::SoilMoisture).mean, None);
    }
}
