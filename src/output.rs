//! CSV output: the backup artifact and the derived-series export.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use csv::WriterBuilder;
use tracing::{debug, info};

use crate::parser::TIME_COLUMNS;
use crate::prepare::Prepared;
use crate::record::{Measurement, WeatherRecord, WeatherSeries};

/// Name of the derived column in exports.
pub const ROLLING_COLUMN: &str = "temp_rolling_24h";

fn cell(value: Option<f64>) -> String {
    value.map_or_else(String::new, |v| format!("{v:?}"))
}

fn record_cells(record: &WeatherRecord) -> Vec<String> {
    std::iter::once(record.timestamp.clone())
        .chain(Measurement::ALL.iter().map(|m| cell(record.get(*m))))
        .collect()
}

fn header(extra: Option<&str>) -> Vec<&str> {
    std::iter::once(TIME_COLUMNS[0])
        .chain(Measurement::ALL.iter().map(|m| m.column()))
        .chain(extra)
        .collect()
}

/// Writes the backup CSV: one header row, one row per record, nulls as empty cells.
pub fn write_series<W: Write>(series: &WeatherSeries, writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    writer.write_record(header(None))?;
    for record in series {
        writer.write_record(record_cells(record))?;
    }
    writer.flush()?;

    Ok(())
}

/// Encodes the backup CSV into memory, ready for upload.
pub fn series_to_csv(series: &WeatherSeries) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_series(series, &mut buf)?;
    Ok(buf)
}

/// Writes the backup CSV to `path`, replacing any previous file.
pub fn write_series_file(path: &Path, series: &WeatherSeries) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let file = std::fs::File::create(path)?;
    write_series(series, file)?;

    info!(path = %path.display(), rows = series.len(), "CSV backup written");
    Ok(())
}

/// Writes the prepared, sorted series with the rolling-mean column appended.
pub fn write_prepared<W: Write>(prepared: &Prepared, writer: W) -> Result<()> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(writer);

    writer.write_record(header(Some(ROLLING_COLUMN)))?;
    for r in prepared.records() {
        let mut cells = record_cells(&r.record);
        cells.push(cell(r.temp_rolling_24h));
        writer.write_record(cells)?;
    }
    writer.flush()?;

    debug!(rows = prepared.records().len(), "Derived series written");
    Ok(())
}
