//! CSV output assembler
//!
//! Rows are appended as batches are committed, so the file grows
//! newest-first while the download walks back in time. [`CsvRowWriter::finish`]
//! reverses the file into ascending order, or removes it when nothing was
//! committed.

use crate::{BarSize, DataType, Row};
use csv::{Terminator, Writer, WriterBuilder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{FinishedOutput, OutputError, OutputResult, OutputWriter, RowWriter};

const DEFAULT_BUFFER_SIZE: usize = 8192; // 8KB buffer

/// CSV writer for committed rows
pub struct CsvRowWriter {
    path: PathBuf,
    writer: Writer<BufWriter<File>>,
    data_type: DataType,
    date_format: &'static str,
    rows_written: u64,
    last_row: Option<Row>,
}

impl CsvRowWriter {
    /// Create the output file, truncating any existing one
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `data_type` - Series, selects the column layout
    /// * `bar_size` - Bar size, selects the date format
    pub fn new<P: AsRef<Path>>(path: P, data_type: DataType, bar_size: BarSize) -> OutputResult<Self> {
        let path = path.as_ref();
        info!("Creating CSV writer: path={}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| OutputError::IoError(format!("Failed to create directory: {e}")))?;
        }

        let file = File::create(path)
            .map_err(|e| OutputError::IoError(format!("Failed to create file: {e}")))?;

        let writer = WriterBuilder::new()
            .has_headers(false)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file));

        Ok(Self {
            path: path.to_path_buf(),
            writer,
            data_type,
            date_format: bar_size.row_date_format(),
            rows_written: 0,
            last_row: None,
        })
    }

    /// Output file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowWriter for CsvRowWriter {
    fn write_rows(&mut self, rows: &[Row]) -> OutputResult<()> {
        for row in rows {
            self.writer
                .write_record(row.record(self.data_type, self.date_format))
                .map_err(|e| OutputError::CsvError(format!("Failed to write row: {e}")))?;
            self.rows_written += 1;
        }

        if let Some(last) = rows.last() {
            self.last_row = Some(last.clone());
        }

        // A committed batch must survive an abort
        self.flush()
    }

    fn last_row(&self) -> Option<&Row> {
        self.last_row.as_ref()
    }

    fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl OutputWriter for CsvRowWriter {
    fn flush(&mut self) -> OutputResult<()> {
        self.writer
            .flush()
            .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))
    }

    fn finish(mut self) -> OutputResult<FinishedOutput> {
        self.flush()?;

        let buf_writer = self
            .writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get inner writer: {e}")))?;
        let file = buf_writer
            .into_inner()
            .map_err(|e| OutputError::IoError(format!("Failed to get file handle: {e}")))?;
        file.sync_all()
            .map_err(|e| OutputError::IoError(format!("Failed to sync file: {e}")))?;
        drop(file);

        if self.rows_written == 0 {
            info!("Nothing was written to the output file, removing output file.");
            std::fs::remove_file(&self.path)
                .map_err(|e| OutputError::IoError(format!("Failed to remove file: {e}")))?;
            return Ok(FinishedOutput::Removed);
        }

        info!("Reversing the output file...");
        reverse_lines(&self.path)?;

        info!(
            "CSV writer closed successfully: {} rows written to {}",
            self.rows_written,
            self.path.display()
        );
        Ok(FinishedOutput::Written {
            path: self.path,
            rows: self.rows_written,
        })
    }
}

/// Rewrite `path` with its lines in reverse order
///
/// The reversed content goes to a sibling file first and replaces the
/// original with a rename.
pub fn reverse_lines(path: &Path) -> OutputResult<()> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| OutputError::IoError(format!("Failed to read {}: {e}", path.display())))?;

    let mut staging_name = path.file_name().unwrap_or_default().to_os_string();
    staging_name.push(".partial");
    let staging = path.with_file_name(staging_name);

    let file = File::create(&staging)
        .map_err(|e| OutputError::IoError(format!("Failed to create staging file: {e}")))?;
    let mut out = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, file);

    let mut lines = 0usize;
    for line in content.lines().rev() {
        writeln!(out, "{line}")
            .map_err(|e| OutputError::IoError(format!("Failed to write line: {e}")))?;
        lines += 1;
    }
    out.flush()
        .map_err(|e| OutputError::FlushError(format!("Failed to flush: {e}")))?;
    drop(out);

    std::fs::rename(&staging, path)
        .map_err(|e| OutputError::IoError(format!("Failed to replace output file: {e}")))?;
    debug!(lines, "Output file reversed");
    Ok(())
}
