//! Drops hours for which the archive has not reported anything yet.

use tracing::debug;

use crate::record::{WeatherRecord, WeatherSeries};

/// Removes records whose five measurements are all null.
///
/// Partially null records are kept untouched and the input order is preserved.
pub fn normalize(raw: Vec<WeatherRecord>) -> WeatherSeries {
    normalize_indexed(raw).0
}

/// Like [`normalize`], also returning each retained record's position in `raw`.
pub fn normalize_indexed(raw: Vec<WeatherRecord>) -> (WeatherSeries, Vec<usize>) {
    let total = raw.len();
    let (source_index, records): (Vec<usize>, Vec<WeatherRecord>) = raw
        .into_iter()
        .enumerate()
        .filter(|(_, r)| !r.is_empty())
        .unzip();

    debug!(total, retained = records.len(), dropped = total - records.len(), "Normalized series");
    (WeatherSeries::new(records), source_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Measurement;

    fn hour(h: u32) -> WeatherRecord {
        WeatherRecord::new(format!("2024-03-01T{h:02}:00"))
    }

    #[test]
    fn test_drops_only_fully_empty_rows() {
        let raw = vec![
            hour(0).with(Measurement::Temperature, Some(3.2)),
            hour(1),
            hour(2).with(Measurement::RelativeHumidity, Some(88.0)),
            hour(3),
        ];

        let series = normalize(raw);

        assert_eq!(series.len(), 2);
        assert_eq!(series.records()[0].timestamp, "2024-03-01T00:00");
        assert_eq!(series.records()[1].timestamp, "2024-03-01T02:00");
    }

    #[test]
    fn test_partial_rows_are_unchanged() {
        let partial = hour(5)
            .with(Measurement::SoilTemperature, Some(6.1))
            .with(Measurement::DewPoint, None);

        let series = normalize(vec![partial.clone()]);

        assert_eq!(series.records(), &[partial]);
    }

    #[test]
    fn test_keeps_input_order() {
        let raw = vec![
            hour(7).with(Measurement::Temperature, Some(1.0)),
            hour(2).with(Measurement::Temperature, Some(2.0)),
            hour(4).with(Measurement::Temperature, Some(3.0)),
        ];

        let series = normalize(raw);
        let stamps: Vec<_> = series.iter().map(|r| r.timestamp.as_str()).collect();

        assert_eq!(stamps, ["2024-03-01T07:00", "2024-03-01T02:00", "2024-03-01T04:00"]);
    }

    #[test]
    fn test_output_never_longer_and_never_empty_rows() {
        let raw: Vec<_> = (0..24)
            .map(|h| {
                let value = if h % 3 == 0 { None } else { Some(h as f64) };
                hour(h).with(Measurement::SoilMoisture, value)
            })
            .collect();
        let input_len = raw.len();

        let series = normalize(raw);

        assert!(series.len() <= input_len);
        assert_eq!(series.len(), 16);
        assert!(series.iter().all(|r| !r.is_empty()));
    }

    #[test]
    fn test_indexed_keeps_source_positions() {
        let raw = vec![
            hour(0).with(Measurement::Temperature, Some(5.0)),
            hour(1),
            hour(2).with(Measurement::Temperature, Some(7.0)),
        ];

        let (series, source_index) = normalize_indexed(raw);

        assert_eq!(series.len(), 2);
        assert_eq!(source_index, vec![0, 2]);
    }

    #[test]
    fn test_empty_input() {
        assert!(normalize(Vec::new()).is_empty());
    }
}
