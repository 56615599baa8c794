//! Data output writers

use crate::Row;
use std::path::PathBuf;

pub mod csv;
pub mod path;

/// Output writer errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Buffer flush error
    #[error("flush error: {0}")]
    FlushError(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// What was left on disk once a writer finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishedOutput {
    /// File holds `rows` rows in ascending order
    Written {
        /// Output file
        path: PathBuf,
        /// Row count
        rows: u64,
    },
    /// Nothing was committed and the file was removed
    Removed,
}

/// Generic output writer trait
pub trait OutputWriter {
    /// Flush any buffered data to disk
    fn flush(&mut self) -> OutputResult<()>;

    /// Close the writer and finalize output
    fn finish(self) -> OutputResult<FinishedOutput>;
}

/// Committed row stream fed by the batch orchestrator
///
/// Batches are committed newest-first, walking back in time; the most
/// recently committed row is the de-duplication anchor for the next batch.
pub trait RowWriter: OutputWriter {
    /// Append already de-duplicated rows
    fn write_rows(&mut self, rows: &[Row]) -> OutputResult<()>;

    /// Last committed row, if any
    fn last_row(&self) -> Option<&Row>;

    /// Rows committed so far
    fn rows_written(&self) -> u64;
}
