//! Benchmark report export.
//!
//! Renders a [TrialTable] to CSV with one row per trial and a derived
//! throughput column, and writes it to a timestamped file whose name encodes
//! the tooling, system, data source and storage format of the run.

use crate::error::FetchBenchError;
use crate::timer::{MValue, TrialTable, RUNTIME_COLUMN};

use std::path::PathBuf;

use time::macros::format_description;
use time::OffsetDateTime;

/// Name of the derived throughput column.
pub const THROUGHPUT_COLUMN: &str = "throughput";

/// Name of the byte-count metadata column the throughput is derived from.
const NBYTES_COLUMN: &str = "nbytes";

/// Render a [TrialTable] to CSV.
///
/// Columns are the table's columns followed by a derived [THROUGHPUT_COLUMN]
/// (bytes per second, `nbytes` divided by the runtime) for rows that carry an
/// `nbytes` value. Cells for keys missing from a trial are left empty.
pub fn to_csv(table: &TrialTable) -> String {
    let mut csv = String::new();
    let header: Vec<String> = table
        .columns()
        .iter()
        .map(|column| escape(column))
        .chain(std::iter::once(THROUGHPUT_COLUMN.to_string()))
        .collect();
    csv.push_str(&header.join(","));
    csv.push('\n');
    for (index, row) in table.rows().iter().enumerate() {
        let mut cells: Vec<String> = row
            .iter()
            .map(|cell| cell.as_ref().map(render).unwrap_or_default())
            .collect();
        cells.push(
            throughput(table, index)
                .map(|value| value.to_string())
                .unwrap_or_default(),
        );
        csv.push_str(&cells.join(","));
        csv.push('\n');
    }
    csv
}

/// Returns the throughput in bytes per second for one row, if derivable.
fn throughput(table: &TrialTable, row: usize) -> Option<f64> {
    let nbytes = table.get(row, NBYTES_COLUMN)?.as_f64()?;
    let runtime = table.get(row, RUNTIME_COLUMN)?.as_f64()?;
    if runtime > 0.0 {
        Some(nbytes / runtime)
    } else {
        None
    }
}

/// Render one cell value.
fn render(value: &MValue) -> String {
    match value {
        MValue::String(string) => escape(string),
        MValue::Null => String::new(),
        other => escape(&other.to_string()),
    }
}

/// Quote a CSV field if it contains a delimiter, quote or newline.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Write a [TrialTable] to a CSV report file.
///
/// The file is named `rust-{system}-{source}-{format}-{timestamp}.csv` and
/// placed in `output_dir`, which is created if missing. A leading `~` in the
/// output directory is expanded.
///
/// Returns the path of the written file.
///
/// # Arguments
///
/// * `table`: The trial table to export
/// * `output_dir`: Directory to write the report into
/// * `system`: System label, e.g. the cluster name
/// * `source`: Data source label
/// * `format`: Storage format label
pub fn write_report(
    table: &TrialTable,
    output_dir: &str,
    system: &str,
    source: &str,
    format: &str,
) -> Result<PathBuf, FetchBenchError> {
    let timestamp = OffsetDateTime::now_utc()
        .format(format_description!(
            "[year][month][day]T[hour][minute][second]"
        ))
        .map_err(|error| FetchBenchError::ReportFormat {
            error: error.to_string(),
        })?;
    let dir = expanduser::expanduser(output_dir)?;
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!(
        "rust-{}-{}-{}-{}.csv",
        system, source, format, timestamp
    ));
    std::fs::write(&path, to_csv(table))?;
    tracing::info!("Wrote report to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::timer::DiagnosticTimer;

    #[test]
    fn csv_empty_table() {
        let timer = DiagnosticTimer::new();
        assert_eq!("runtime,throughput\n", to_csv(&timer.dataframe()));
    }

    #[test]
    fn csv_rows_and_missing_cells() {
        let mut timer = DiagnosticTimer::new();
        timer.time([("nworkers", MValue::from(2)), ("source", "gcs".into())]);
        timer.time([("nworkers", MValue::from(4)), ("format", "zarr".into())]);
        let csv = to_csv(&timer.dataframe());
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(3, lines.len());
        assert_eq!("nworkers,source,format,runtime,throughput", lines[0]);
        assert!(lines[1].starts_with("2,gcs,,"));
        assert!(lines[2].starts_with("4,,zarr,"));
    }

    #[test]
    fn csv_escapes_delimiters() {
        let mut timer = DiagnosticTimer::new();
        timer.time([("source", MValue::from("earth,engine")), ("note", "say \"hi\"".into())]);
        let csv = to_csv(&timer.dataframe());
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[1].starts_with("\"earth,engine\",\"say \"\"hi\"\"\""));
    }

    #[test]
    fn csv_derives_throughput() {
        let mut timer = DiagnosticTimer::new();
        {
            let _guard = timer.time([("nbytes", MValue::from(1_000_000))]);
            std::thread::sleep(std::time::Duration::from_millis(50));
        }
        let table = timer.dataframe();
        let value = throughput(&table, 0).unwrap();
        // 1 MB in at least 50 ms.
        assert!(value > 0.0);
        assert!(value <= 20_000_000.0);
        let csv = to_csv(&table);
        let lines: Vec<&str> = csv.lines().collect();
        assert!(!lines[1].ends_with(','));
    }

    #[test]
    fn csv_throughput_empty_without_nbytes() {
        let mut timer = DiagnosticTimer::new();
        timer.time([("nworkers", MValue::from(1))]);
        let csv = to_csv(&timer.dataframe());
        let lines: Vec<&str> = csv.lines().collect();
        assert!(lines[1].ends_with(','));
    }

    #[test]
    fn report_file_name() {
        let mut timer = DiagnosticTimer::new();
        timer.time([("nworkers", MValue::from(1))]);
        let dir = std::env::temp_dir().join("fetchbench-report-test");
        let path = write_report(&timer.dataframe(), dir.to_str().unwrap(), "hpc", "s3", "zarr")
            .unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("rust-hpc-s3-zarr-"));
        assert!(name.ends_with(".csv"));
        assert!(path.exists());
        std::fs::remove_file(path).unwrap();
    }
}
