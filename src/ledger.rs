//! CSV ledgers
//!
//! Each ledger owns one buffered writer for the whole run. Opening a ledger
//! truncates the file and writes its header; rows are appended in the order
//! they are handed in.

use crate::error::Error;
use crate::export::ExportRecord;
use crate::types::FileStats;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Header of the statistics ledger
pub const STATS_HEADER: [&str; 6] = [
    "file_name",
    "number_of_queries",
    "queries_with_error",
    "corrupted_queries",
    "percentage_of_errors",
    "time_taken_seconds",
];

/// Header of the error ledger
pub const ERROR_HEADER: [&str; 2] = ["error", "code"];

/// Header of the export run summary ledger
pub const SUMMARY_HEADER: [&str; 4] = ["FileName", "DurationSeconds", "JsonFile", "Status"];

/// Quote a CSV field if it contains a comma, quote or line break
#[must_use]
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// A CSV file written row by row
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl Ledger {
    /// Create (or truncate) the ledger file and write its header
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create(path: impl Into<PathBuf>, header: &[&str]) -> Result<Self, Error> {
        let path = path.into();
        let file = File::create(&path).map_err(|err| Error::io(&path, err))?;
        let mut ledger = Self {
            path,
            writer: BufWriter::new(file),
        };
        ledger.write_row(header.iter().copied())?;
        log::debug!("Opened ledger {}", ledger.path.display());
        Ok(ledger)
    }

    /// Append one row
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn write_row<I, S>(&mut self, fields: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let line = fields
            .into_iter()
            .map(|field| escape_field(field.as_ref()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(self.writer, "{line}").map_err(|err| Error::io(&self.path, err))
    }

    /// Flush buffered rows to disk
    ///
    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.writer
            .flush()
            .map_err(|err| Error::io(&self.path, err))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Per-file statistics ledger
#[derive(Debug)]
pub struct StatsLedger(Ledger);

impl StatsLedger {
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, Error> {
        Ledger::create(path, &STATS_HEADER).map(Self)
    }

    /// Append the row for one file
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn append(&mut self, stats: &FileStats) -> Result<(), Error> {
        self.0.write_row([
            stats.file_name.clone(),
            stats.total_statements.to_string(),
            stats.failed_statements.to_string(),
            stats.corrupted_statements.to_string(),
            format!("{:.2}", stats.error_percentage),
            stats.elapsed_seconds.to_string(),
        ])
    }

    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.0.flush()
    }
}

/// Error ledger: one `{summary},{file stem}` row per failed statement
#[derive(Debug)]
pub struct ErrorLedger(Ledger);

impl ErrorLedger {
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, Error> {
        Ledger::create(path, &ERROR_HEADER).map(Self)
    }

    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn append(&mut self, summary: &str, stem: &str) -> Result<(), Error> {
        self.0.write_row([summary, stem])
    }

    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.0.flush()
    }
}

/// Export run summary ledger
#[derive(Debug)]
pub struct SummaryLedger(Ledger);

impl SummaryLedger {
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, Error> {
        Ledger::create(path, &SUMMARY_HEADER).map(Self)
    }

    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn append(&mut self, record: &ExportRecord) -> Result<(), Error> {
        self.0.write_row([
            record.filename.clone(),
            record.duration_seconds.to_string(),
            record.output_document.clone(),
            record.status.to_string(),
        ])
    }

    /// # Errors
    ///
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.0.flush()
    }
}
