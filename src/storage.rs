//! Append-only CSV output.
//!
//! The header decision is made against an [`OutputSink`] instead of probing the
//! filesystem directly, so the same logic runs against a file on disk or an
//! in-memory buffer.

use crate::analytics::ResultRow;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Name of the column appended to every record.
pub const PROPERTY_COLUMN: &str = "property";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to open output {target}: {source}")]
    Open { target: String, source: io::Error },

    #[error("Failed to write output {target}: {source}")]
    Write { target: String, source: csv::Error },

    #[error("Failed to flush output {target}: {source}")]
    Flush { target: String, source: io::Error },
}

/// Somewhere CSV records can be appended to.
pub trait OutputSink {
    type Writer: Write;

    /// Whether the sink already holds data from an earlier run.
    fn has_data(&self) -> io::Result<bool>;

    /// Opens the sink for appending, creating it when missing.
    fn open_append(&self) -> io::Result<Self::Writer>;

    /// Human readable location, used in messages.
    fn describe(&self) -> String;
}

/// A CSV file on disk.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSink { path: path.into() }
    }
}

impl OutputSink for FileSink {
    type Writer = fs::File;

    /// An existing but empty file counts as having no data.
    fn has_data(&self) -> io::Result<bool> {
        match fs::metadata(&self.path) {
            Ok(metadata) => Ok(metadata.len() > 0),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn open_append(&self) -> io::Result<fs::File> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        OpenOptions::new().create(true).append(true).open(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An in-memory sink. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that already contains `content`, as if written by an earlier run.
    pub fn with_content(content: &str) -> Self {
        MemorySink {
            buffer: Arc::new(Mutex::new(content.as_bytes().to_vec())),
        }
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

#[derive(Debug)]
pub struct MemoryWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for MemorySink {
    type Writer = MemoryWriter;

    fn has_data(&self) -> io::Result<bool> {
        let buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        Ok(!buffer.is_empty())
    }

    fn open_append(&self) -> io::Result<MemoryWriter> {
        Ok(MemoryWriter {
            buffer: Arc::clone(&self.buffer),
        })
    }

    fn describe(&self) -> String {
        "<memory>".to_string()
    }
}

/// The header for a batch: the first row's field names plus the property
/// column.
pub fn header_for(row: &ResultRow) -> Vec<String> {
    row.keys()
        .cloned()
        .chain(std::iter::once(PROPERTY_COLUMN.to_string()))
        .collect()
}

/// One CSV record built from a result row.
///
/// The row's values are kept in their original order, `keys` is flattened to
/// its first term and the property URI is appended last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    values: Vec<String>,
}

impl OutputRecord {
    pub fn from_row(row: &ResultRow, property: &str) -> Self {
        let values = row
            .iter()
            .map(|(name, value)| match (name.as_str(), value) {
                ("keys", Value::Array(terms)) => {
                    terms.first().map(field_value).unwrap_or_default()
                }
                _ => field_value(value),
            })
            .chain(std::iter::once(property.to_string()))
            .collect();
        OutputRecord { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

fn field_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// The CSV output of one run.
///
/// The sink is opened lazily by [`CsvReport::prepare_output`] and then kept
/// open until [`CsvReport::finish`].
pub struct CsvReport<S: OutputSink> {
    sink: S,
    writer: Option<csv::Writer<S::Writer>>,
    header_written: bool,
    rows_written: usize,
}

impl<S: OutputSink> CsvReport<S> {
    pub fn new(sink: S) -> Self {
        CsvReport {
            sink,
            writer: None,
            header_written: false,
            rows_written: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn describe(&self) -> String {
        self.sink.describe()
    }

    /// Makes sure the output is open and carries a header.
    ///
    /// Returns `false` when the header could not be decided yet: the sink is
    /// empty and `rows` has nothing to derive it from. Nothing is created in
    /// that case.
    pub fn prepare_output(&mut self, rows: &[ResultRow]) -> Result<bool, OutputError> {
        if self.writer.is_some() {
            return Ok(true);
        }

        let has_data = self.sink.has_data().map_err(|source| self.open_error(source))?;
        let header = if has_data {
            None
        } else {
            match rows.first() {
                Some(row) => Some(header_for(row)),
                None => return Ok(false),
            }
        };

        let file = self
            .sink
            .open_append()
            .map_err(|source| self.open_error(source))?;
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        if let Some(header) = header {
            writer
                .write_record(&header)
                .map_err(|source| self.write_error(source))?;
            writer.flush().map_err(|source| self.flush_error(source))?;
            self.header_written = true;
            tracing::debug!(target_file = %self.sink.describe(), ?header, "Wrote CSV header");
        }

        self.writer = Some(writer);
        Ok(true)
    }

    /// Appends one record per row, tagged with `property`.
    ///
    /// All records are built before the first one is written and the writer
    /// is flushed afterwards, so the output holds only complete records.
    pub fn append_rows(&mut self, rows: &[ResultRow], property: &str) -> Result<usize, OutputError> {
        if rows.is_empty() {
            return Ok(0);
        }
        if !self.prepare_output(rows)? {
            return Ok(0);
        }

        let records: Vec<OutputRecord> = rows
            .iter()
            .map(|row| OutputRecord::from_row(row, property))
            .collect();

        let target = self.sink.describe();
        let Some(writer) = self.writer.as_mut() else {
            return Ok(0);
        };
        for record in &records {
            writer
                .write_record(record.values())
                .map_err(|source| OutputError::Write {
                    target: target.clone(),
                    source,
                })?;
        }
        writer.flush().map_err(|source| OutputError::Flush {
            target: target.clone(),
            source,
        })?;

        self.rows_written += records.len();
        Ok(records.len())
    }

    /// Flushes and closes the output. Returns the number of data rows written
    /// during this run.
    pub fn finish(mut self) -> Result<usize, OutputError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|source| self.flush_error(source))?;
        }
        Ok(self.rows_written)
    }

    fn open_error(&self, source: io::Error) -> OutputError {
        OutputError::Open {
            target: self.sink.describe(),
            source,
        }
    }

    fn write_error(&self, source: csv::Error) -> OutputError {
        OutputError::Write {
            target: self.sink.describe(),
            source,
        }
    }

    fn flush_error(&self, source: io::Error) -> OutputError {
        OutputError::Flush {
            target: self.sink.describe(),
            source,
        }
    }
}
