//! Diagnostic timing of benchmark trials.
//!
//! A [DiagnosticTimer] accumulates one [TimingRecord] per measured trial. Each
//! record combines caller-supplied metadata (worker counts, data source
//! labels, byte counts) with the measured wall-clock runtime. The records are
//! materialised into a [TrialTable] on demand, with the column set inferred
//! lazily as the union of all metadata keys seen.

use std::time::{Duration, Instant};

/// A metadata value attached to a timing record.
///
/// This is an alias of the Value type from serde_json, which can represent
/// any descriptive scalar supplied by a caller: integers, floating point
/// numbers and strings.
pub type MValue = serde_json::Value;

/// Name of the measured-duration column in the exported table.
pub const RUNTIME_COLUMN: &str = "runtime";

/// One timed trial: caller-supplied metadata plus the measured runtime.
///
/// Records are created when a [TimingGuard] is dropped and are immutable
/// thereafter.
#[derive(Clone, Debug)]
pub struct TimingRecord {
    /// Metadata key/value pairs, in the order supplied by the caller.
    metadata: Vec<(String, MValue)>,
    /// Measured wall-clock duration of the trial.
    runtime: Duration,
}

impl TimingRecord {
    /// Returns the metadata pairs for this trial.
    pub fn metadata(&self) -> &[(String, MValue)] {
        &self.metadata
    }

    /// Returns the measured wall-clock duration of this trial.
    pub fn runtime(&self) -> Duration {
        self.runtime
    }

    /// Returns the metadata value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&MValue> {
        self.metadata
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Accumulates timing records across repeated benchmark trials.
#[derive(Debug, Default)]
pub struct DiagnosticTimer {
    /// Completed trial records, in completion order.
    records: Vec<TimingRecord>,
}

impl DiagnosticTimer {
    /// Returns a new DiagnosticTimer with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin measuring one trial.
    ///
    /// Starts a wall-clock timer and returns a guard. When the guard is
    /// dropped the elapsed time is recorded together with `metadata`, on every
    /// exit path from the measured block, including early returns and panics.
    ///
    /// # Arguments
    ///
    /// * `metadata`: descriptive key/value pairs to attach to the record
    pub fn time<I, K, V>(&mut self, metadata: I) -> TimingGuard<'_>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MValue>,
    {
        let metadata = metadata
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        TimingGuard {
            timer: self,
            metadata: Some(metadata),
            started: Instant::now(),
        }
    }

    /// Returns the number of completed trials.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no trials have completed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the completed trial records.
    pub fn records(&self) -> &[TimingRecord] {
        &self.records
    }

    /// Materialise the accumulated records into a [TrialTable].
    ///
    /// The column set is the union of all metadata keys across records, in
    /// first-appearance order, followed by the [RUNTIME_COLUMN] holding the
    /// measured duration in seconds. Rows missing a key hold an empty cell.
    ///
    /// The records are not consumed; calling this twice without an
    /// intervening trial returns an identical table both times.
    pub fn dataframe(&self) -> TrialTable {
        let mut columns: Vec<String> = Vec::new();
        for record in &self.records {
            for (key, _) in &record.metadata {
                if key != RUNTIME_COLUMN && !columns.iter().any(|column| column == key) {
                    columns.push(key.clone());
                }
            }
        }
        let rows = self
            .records
            .iter()
            .map(|record| {
                let mut row: Vec<Option<MValue>> = columns
                    .iter()
                    .map(|column| record.get(column).cloned())
                    .collect();
                // The runtime cell is always the measured duration, last.
                row.push(Some(record.runtime.as_secs_f64().into()));
                row
            })
            .collect();
        columns.push(RUNTIME_COLUMN.to_string());
        TrialTable { columns, rows }
    }
}

/// Scoped handle for one in-flight measurement.
///
/// Dropping the guard ends the measurement and appends the record to the
/// owning [DiagnosticTimer].
#[derive(Debug)]
pub struct TimingGuard<'a> {
    /// The timer to record into on drop.
    timer: &'a mut DiagnosticTimer,
    /// Metadata to attach, taken on drop.
    metadata: Option<Vec<(String, MValue)>>,
    /// Start of the measured interval.
    started: Instant,
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        let runtime = self.started.elapsed();
        self.timer.records.push(TimingRecord {
            metadata: self.metadata.take().unwrap_or_default(),
            runtime,
        });
    }
}

/// Tabular export of a [DiagnosticTimer]'s records.
///
/// Rows correspond to trials and columns to the union of metadata keys plus
/// the runtime. Cells are `None` where a trial did not supply the key.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialTable {
    /// Column names, metadata keys first, runtime last.
    columns: Vec<String>,
    /// One row per trial, aligned with `columns`.
    rows: Vec<Vec<Option<MValue>>>,
}

impl TrialTable {
    /// Returns the column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the rows, each aligned with [columns](TrialTable::columns).
    pub fn rows(&self) -> &[Vec<Option<MValue>>] {
        &self.rows
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the cell for `column` in row `row`, if the column exists and
    /// the cell is non-empty.
    pub fn get(&self, row: usize, column: &str) -> Option<&MValue> {
        let index = self.columns.iter().position(|name| name == column)?;
        self.rows.get(row)?.get(index)?.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::thread::sleep;

    #[test]
    fn no_records() {
        let timer = DiagnosticTimer::new();
        assert!(timer.is_empty());
        let table = timer.dataframe();
        assert!(table.is_empty());
        assert_eq!(&["runtime".to_string()], table.columns());
    }

    #[test]
    fn one_record() {
        let mut timer = DiagnosticTimer::new();
        {
            let _guard = timer.time([("nworkers", MValue::from(3)), ("source", "test".into())]);
            sleep(Duration::from_millis(100));
        }
        assert_eq!(1, timer.len());
        let table = timer.dataframe();
        assert_eq!(1, table.len());
        assert_eq!(
            &["nworkers".to_string(), "source".to_string(), "runtime".to_string()],
            table.columns()
        );
        assert_eq!(Some(&MValue::from(3)), table.get(0, "nworkers"));
        assert_eq!(Some(&MValue::from("test")), table.get(0, "source"));
        let runtime = table.get(0, "runtime").unwrap().as_f64().unwrap();
        // Allow for scheduler jitter.
        assert!(runtime >= 0.1);
        assert!(runtime < 1.0);
    }

    #[test]
    fn column_union_preserves_first_appearance_order() {
        let mut timer = DiagnosticTimer::new();
        timer.time([("a", MValue::from(1)), ("b", MValue::from(2))]);
        timer.time([("b", MValue::from(3)), ("c", MValue::from(4))]);
        let table = timer.dataframe();
        assert_eq!(2, table.len());
        assert_eq!(
            &[
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "runtime".to_string()
            ],
            table.columns()
        );
        // Keys missing from a trial resolve to empty cells.
        assert_eq!(Some(&MValue::from(1)), table.get(0, "a"));
        assert_eq!(None, table.get(0, "c"));
        assert_eq!(None, table.get(1, "a"));
        assert_eq!(Some(&MValue::from(4)), table.get(1, "c"));
    }

    #[test]
    fn one_row_per_trial() {
        let mut timer = DiagnosticTimer::new();
        for trial in 0..5 {
            let _guard = timer.time([("trial", MValue::from(trial))]);
        }
        let table = timer.dataframe();
        assert_eq!(5, table.len());
        for row in 0..5 {
            let runtime = table.get(row, "runtime").unwrap().as_f64().unwrap();
            assert!(runtime >= 0.0);
        }
    }

    #[test]
    fn dataframe_is_idempotent() {
        let mut timer = DiagnosticTimer::new();
        timer.time([("nworkers", MValue::from(8))]);
        assert_eq!(timer.dataframe(), timer.dataframe());
    }

    #[test]
    fn records_on_panic() {
        let mut timer = DiagnosticTimer::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = timer.time([("source", MValue::from("panicking"))]);
            panic!("measured block failed");
        }));
        assert!(result.is_err());
        assert_eq!(1, timer.len());
        assert_eq!(
            Some(&MValue::from("panicking")),
            timer.records()[0].get("source")
        );
    }

    #[test]
    fn empty_metadata() {
        let mut timer = DiagnosticTimer::new();
        timer.time(std::iter::empty::<(String, MValue)>());
        let table = timer.dataframe();
        assert_eq!(1, table.len());
        assert_eq!(&["runtime".to_string()], table.columns());
    }
}
