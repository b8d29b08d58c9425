//! CSV reader for weather tables, either our own backup or a user upload.

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::error::{PipelineError, Result};
use crate::record::{Measurement, WeatherRecord};

/// Time column names, in order of preference.
pub const TIME_COLUMNS: [&str; 2] = ["timestamp", "time"];

/// A CSV table as read, before any typing beyond splitting cells.
#[derive(Debug, Clone)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of the time column, if the table has one.
    pub fn time_column(&self) -> Option<usize> {
        TIME_COLUMNS.iter().find_map(|name| self.column(name))
    }

    /// Types every row into a [`WeatherRecord`].
    ///
    /// Measurement columns absent from the header read as null. Fails when the
    /// table has no time column or a cell is not a number.
    pub fn to_records(&self) -> Result<Vec<WeatherRecord>> {
        let time_idx = self
            .time_column()
            .ok_or_else(|| PipelineError::malformed("table has no 'timestamp' or 'time' column"))?;

        let columns: Vec<(Measurement, usize)> = Measurement::ALL
            .into_iter()
            .filter_map(|m| self.column(m.column()).map(|idx| (m, idx)))
            .collect();

        self.rows
            .iter()
            .enumerate()
            .map(|(row_no, row)| {
                let mut record = WeatherRecord::new(row.get(time_idx).unwrap_or_default());
                for (m, idx) in &columns {
                    let value = parse_cell(row.get(*idx).unwrap_or_default()).ok_or_else(|| {
                        PipelineError::malformed(format!(
                            "row {}, column {}: {:?} is not a number",
                            row_no + 1,
                            m.column(),
                            row.get(*idx).unwrap_or_default()
                        ))
                    })?;
                    record.set(*m, value);
                }
                Ok(record)
            })
            .collect()
    }
}

/// `Some(None)` for a null cell, `None` when the cell is not numeric.
fn parse_cell(cell: &str) -> Option<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Some(None);
    }
    cell.parse::<f64>().ok().map(Some)
}

/// Reads CSV bytes with a header row.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedInput`] if the CSV is unreadable, rows
/// have differing lengths, or none of the measurement columns are present.
pub fn parse_table(bytes: &[u8]) -> Result<RawTable> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::malformed(format!("unreadable CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if !Measurement::ALL
        .iter()
        .any(|m| headers.iter().any(|h| h == m.column()))
    {
        return Err(PipelineError::malformed(format!(
            "CSV header {:?} contains none of the weather measurement columns",
            headers
        )));
    }

    let rows = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PipelineError::malformed(format!("unreadable CSV row: {e}")))?;

    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_backup_header() {
        let csv = "timestamp,temperature_2m,soil_temperature_0_to_7cm,soil_moisture_0_to_7cm,dew_point_2m,relative_humidity_2m\n\
                   2024-01-01T00:00,5.0,4.1,0.3,2.0,81\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.time_column(), Some(0));

        let records = table.to_records().unwrap();
        assert_eq!(records[0].timestamp, "2024-01-01T00:00");
        assert_eq!(records[0].temperature_2m, Some(5.0));
        assert_eq!(records[0].relative_humidity_2m, Some(81.0));
    }

    #[test]
    fn test_missing_measurement_columns_read_as_null() {
        let csv = "time,temperature_2m\n2024-01-01T00:00,-2.5\n";
        let records = parse_table(csv.as_bytes()).unwrap().to_records().unwrap();
        assert_eq!(records[0].temperature_2m, Some(-2.5));
        assert_eq!(records[0].soil_moisture_0_to_7cm, None);
        assert_eq!(records[0].dew_point_2m, None);
    }

    #[test]
    fn test_empty_and_nan_cells_are_null() {
        let csv = "time,temperature_2m,dew_point_2m\n2024-01-01T00:00,,NaN\n";
        let records = parse_table(csv.as_bytes()).unwrap().to_records().unwrap();
        assert!(records[0].is_empty());
    }

    #[test]
    fn test_timestamp_column_preferred_over_time() {
        let csv = "time,timestamp,temperature_2m\na,b,1\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        assert_eq!(table.time_column(), Some(1));
    }

    #[test]
    fn test_table_without_time_column_is_still_readable() {
        let csv = "temperature_2m,soil_moisture_0_to_7cm\n5.0,0.3\n";
        let table = parse_table(csv.as_bytes()).unwrap();
        assert_eq!(table.time_column(), None);
        assert_eq!(table.len(), 1);
        assert!(matches!(
            table.to_records(),
            Err(PipelineError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_no_measurement_columns_is_malformed() {
        let csv = "time,wind_speed\n2024-01-01T00:00,3\n";
        assert!(matches!(
            parse_table(csv.as_bytes()),
            Err(PipelineError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_non_numeric_cell_is_malformed() {
        let csv = "time,temperature_2m\n2024-01-01T00:00,warm\n";
        let err = parse_table(csv.as_bytes()).unwrap().to_records().unwrap_err();
        assert!(err.to_string().contains("temperature_2m"));
    }

    #[test]
    fn test_ragged_rows_are_malformed() {
        let csv = "time,temperature_2m\n2024-01-01T00:00,1.0,extra\n";
        assert!(parse_table(csv.as_bytes()).is_err());
    }
}
