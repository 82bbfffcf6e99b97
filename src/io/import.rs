//! CSV import of annual input series.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, info};

use crate::error::ClusterError;
use crate::series::{ScenarioSeries, SeriesKind, TimeSeries};

/// Reads series from a CSV file at the given path.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or [`read_series`] fails.
pub fn read_series_csv(path: &Path) -> Result<ScenarioSeries, ClusterError> {
    let file = File::open(path)?;
    let series = read_series(io::BufReader::new(file))?;
    info!(path = %path.display(), series = series.len(), "input series loaded");
    Ok(series)
}

/// Reads series from CSV with a header row and one column per series.
///
/// Headers are matched with [`SeriesKind::from_header`]; other columns (an
/// hour index, for instance) are skipped. Every recognised column must hold
/// one year at a whole number of steps per hour.
///
/// # Errors
///
/// Returns [`ClusterError::Parse`] for a cell that is not a number and
/// [`ClusterError::SeriesLength`] for a column of the wrong length.
pub fn read_series(reader: impl Read) -> Result<ScenarioSeries, ClusterError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut columns: Vec<(usize, SeriesKind, String, Vec<f64>)> = Vec::new();
    for (index, header) in rdr.headers()?.iter().enumerate() {
        match SeriesKind::from_header(header) {
            Some(kind) if columns.iter().any(|(_, k, _, _)| *k == kind) => {
                debug!(column = header, "duplicate series column skipped");
            }
            Some(kind) => columns.push((index, kind, header.to_string(), Vec::new())),
            None => debug!(column = header, "unrecognised column skipped"),
        }
    }

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        for (index, _, header, values) in &mut columns {
            let cell = record.get(*index).unwrap_or("");
            let value = cell.parse::<f64>().map_err(|e| ClusterError::Parse {
                column: header.clone(),
                row: row + 1,
                message: format!("\"{cell}\": {e}"),
            })?;
            values.push(value);
        }
    }

    let mut series = ScenarioSeries::new();
    for (_, kind, _, values) in columns {
        series.insert(kind, TimeSeries::new(values)?);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_text(rows: usize, extra: &str) -> String {
        let mut text = String::from("hour,DNI,ppa\n");
        for h in 0..rows {
            text.push_str(&format!("{h},{}.5,1\n", h % 24));
        }
        text.push_str(extra);
        text
    }

    #[test]
    fn reads_known_columns() {
        let series = read_series(csv_text(8760, "").as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        let dni = series.get(SeriesKind::Dni).unwrap();
        assert_eq!(dni.steps_per_hour(), 1);
        assert_eq!(dni.values()[25], 1.5);
        assert_eq!(series.get(SeriesKind::Price).unwrap().values()[0], 1.0);
    }

    #[test]
    fn bad_cell_reports_column_and_row() {
        let mut text = String::from("dni\n1\n2\nabc\n");
        text.push_str("4\n");
        let err = read_series(text.as_bytes()).unwrap_err();
        assert!(matches!(err, ClusterError::Parse { ref column, row: 3, .. } if column == "dni"));
    }

    #[test]
    fn short_columns_are_rejected() {
        let err = read_series(csv_text(100, "").as_bytes()).unwrap_err();
        assert!(matches!(err, ClusterError::SeriesLength { len: 100 }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_series_csv(Path::new("/nonexistent/series.csv")).unwrap_err();
        assert!(matches!(err, ClusterError::Io(_)));
    }
}
