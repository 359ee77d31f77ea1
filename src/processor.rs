//! Per-file validation
//!
//! A [`FileProcessor`] reads one corpus file, validates every statement in
//! it, writes the file's error dump and produces its statistics. Nothing a
//! single file does can fail the run: unreadable files yield a degenerate
//! statistics row instead of an error.

use crate::error::Error;
use crate::ledger::{ErrorLedger, StatsLedger};
use crate::splitter::{split_statements, terminate};
use crate::types::{FailedStatement, FileStats, ValidationOutcome};
use crate::validator::StatementValidator;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Banner opening each entry of an error dump
pub const DUMP_BANNER: &str = "--- INVALID QUERY ---";

/// Separator closing each entry of an error dump (`"+ - "` fifty times)
#[must_use]
pub fn dump_separator() -> String {
    "+ - ".repeat(50)
}

/// What processing one file produced
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    /// File name without extension, used to tag error ledger rows
    pub stem: String,
    pub stats: FileStats,
    /// Statements rejected by the grammar, in file order
    pub failed_statements: Vec<FailedStatement>,
}

impl FileReport {
    /// Append this report's rows to the ledgers: error rows first, then statistics
    ///
    /// # Errors
    ///
    /// Returns an error if a ledger cannot be written.
    pub fn record(&self, stats: &mut StatsLedger, errors: &mut ErrorLedger) -> Result<(), Error> {
        for failed in &self.failed_statements {
            errors.append(&failed.ledger_prefix(), &self.stem)?;
        }
        stats.append(&self.stats)
    }
}

/// Validates whole corpus files
#[derive(Debug, Clone)]
pub struct FileProcessor {
    validator: StatementValidator,
    output_dir: PathBuf,
}

impl FileProcessor {
    /// Create a processor writing error dumps into `output_dir`
    #[must_use]
    pub fn new(validator: StatementValidator, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            validator,
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn validator(&self) -> &StatementValidator {
        &self.validator
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the error dump for a file stem
    #[must_use]
    pub fn dump_path(&self, stem: &str) -> PathBuf {
        self.output_dir.join(format!("{stem}_errors.txt"))
    }

    /// Process one file and return its report
    ///
    /// The error dump is written here; ledger rows are left to the caller.
    #[must_use]
    pub fn process(&self, path: &Path) -> FileReport {
        let started = Instant::now();
        let file_name = file_name_of(path);
        let stem = stem_of(path);

        if !self.validator.is_available() {
            log::error!(
                "Start rule '{}' is not defined by grammar {}; skipping {file_name}",
                self.validator.start_rule(),
                self.validator.grammar().name()
            );
            return FileReport {
                stem,
                stats: FileStats::unreadable(file_name, started.elapsed().as_secs()),
                failed_statements: Vec::new(),
            };
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                log::error!("Error processing file {}: {err}", path.display());
                return FileReport {
                    stem,
                    stats: FileStats::unreadable(file_name, started.elapsed().as_secs()),
                    failed_statements: Vec::new(),
                };
            }
        };

        let statements = split_statements(&content);
        let mut failed = 0;
        let mut corrupted = 0;
        let mut failed_statements = Vec::new();

        for (position, statement) in statements.iter().enumerate() {
            let text = terminate(statement);
            match self.validator.validate(&text) {
                Ok(ValidationOutcome::Valid) => {}
                Ok(ValidationOutcome::Invalid { diagnostics }) => {
                    failed += 1;
                    failed_statements.push(FailedStatement { text, diagnostics });
                }
                Err(err) => {
                    log::warn!("{file_name}: statement {} is corrupted: {err}", position + 1);
                    corrupted += 1;
                }
            }
        }

        if !failed_statements.is_empty() {
            let dump = self.dump_path(&stem);
            if let Err(err) = write_dump(&dump, &failed_statements) {
                log::warn!("Could not write error dump for {file_name}: {err}");
            }
        }

        let stats = FileStats::new(
            file_name,
            statements.len(),
            failed,
            corrupted,
            started.elapsed().as_secs(),
        );
        log::info!(
            "{}: {} statements, {} with errors ({:.2}%), {} corrupted",
            stats.file_name,
            stats.total_statements,
            stats.failed_statements,
            stats.error_percentage,
            stats.corrupted_statements
        );

        FileReport {
            stem,
            stats,
            failed_statements,
        }
    }

    /// Process one file and append its rows to the ledgers
    ///
    /// # Errors
    ///
    /// Returns an error only if a ledger cannot be written.
    pub fn process_into(
        &self,
        path: &Path,
        stats: &mut StatsLedger,
        errors: &mut ErrorLedger,
    ) -> Result<FileStats, Error> {
        let report = self.process(path);
        report.record(stats, errors)?;
        Ok(report.stats)
    }
}

/// Render the error dump for a file's failed statements
#[must_use]
pub fn render_dump(failed: &[FailedStatement]) -> String {
    let separator = dump_separator();
    let mut dump = String::new();
    for statement in failed {
        // Statement text already ends with a newline, so it is followed by a blank line.
        let _ = writeln!(dump, "{DUMP_BANNER}");
        let _ = writeln!(dump, "{}", statement.text);
        let _ = writeln!(dump);
        let _ = writeln!(dump, "{separator}");
        let _ = writeln!(dump);
    }
    dump
}

fn write_dump(path: &Path, failed: &[FailedStatement]) -> Result<(), Error> {
    fs::write(path, render_dump(failed)).map_err(|err| Error::io(path, err))
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| file_name_of(path), |stem| stem.to_string_lossy().into_owned())
}
