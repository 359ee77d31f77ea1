//! Corpus-wide validation runs
//!
//! A [`CorpusValidator`] discovers the corpus files, opens the ledgers once
//! and feeds every file through a [`FileProcessor`]. With more than one job,
//! files are processed by a scoped worker pool while this thread stays the
//! only ledger writer.

use crate::config::Config;
use crate::error::Error;
use crate::grammar::{self, Grammar};
use crate::ledger::{ErrorLedger, StatsLedger};
use crate::processor::{FileProcessor, FileReport};
use crate::types::FileStats;
use crate::validator::{on_parse_stack, StatementValidator, PARSE_STACK_SIZE};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

/// Statistics of a finished run, in discovery order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub files: Vec<FileStats>,
}

impl RunSummary {
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn total_statements(&self) -> usize {
        self.files.iter().map(|stats| stats.total_statements).sum()
    }

    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.files.iter().map(|stats| stats.failed_statements).sum()
    }

    #[must_use]
    pub fn total_corrupted(&self) -> usize {
        self.files
            .iter()
            .map(|stats| stats.corrupted_statements)
            .sum()
    }
}

/// List the files directly inside `dir` with the given extension, sorted by name
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn discover_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, Error> {
    let entries = fs::read_dir(dir).map_err(|err| Error::io(dir, err))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| Error::io(dir, err))?;
        let path = entry.path();
        let matches_extension = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy() == extension);
        if matches_extension && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Validates every file of a corpus directory
#[derive(Debug, Clone)]
pub struct CorpusValidator {
    processor: FileProcessor,
    input_dir: PathBuf,
    extension: String,
    stats_ledger: PathBuf,
    error_ledger: PathBuf,
    jobs: usize,
}

impl CorpusValidator {
    /// Create a validator for the run described by `config`, using the built-in grammar
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_grammar(config, grammar::builtin())
    }

    /// Create a validator for the run described by `config`
    #[must_use]
    pub fn with_grammar(config: &Config, grammar: Arc<dyn Grammar>) -> Self {
        let validator = StatementValidator::new(grammar)
            .with_start_rule(config.start_rule.clone())
            .with_timeout(config.validation_timeout());
        Self {
            processor: FileProcessor::new(validator, config.output_dir.clone()),
            input_dir: config.input_dir.clone(),
            extension: config.extension.clone(),
            stats_ledger: config.stats_ledger_path(),
            error_ledger: config.error_ledger_path(),
            jobs: config.jobs.max(1),
        }
    }

    #[must_use]
    pub fn processor(&self) -> &FileProcessor {
        &self.processor
    }

    /// Run the validation
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created, the
    /// input directory cannot be listed, or a ledger cannot be written.
    /// Problems with individual files never fail the run.
    pub fn run(&self) -> Result<RunSummary, Error> {
        let output_dir = self.processor.output_dir();
        fs::create_dir_all(output_dir).map_err(|source| Error::OutputDirectory {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let files = discover_files(&self.input_dir, &self.extension)?;
        log::info!(
            "Found {} .{} files in {}",
            files.len(),
            self.extension,
            self.input_dir.display()
        );

        let mut stats = StatsLedger::create(&self.stats_ledger)?;
        let mut errors = ErrorLedger::create(&self.error_ledger)?;

        let summary = if self.jobs > 1 && files.len() > 1 {
            self.run_pool(&files, &mut stats, &mut errors)?
        } else {
            on_parse_stack("corpus-sequential", || {
                self.run_sequential(&files, &mut stats, &mut errors)
            })?
        };

        stats.flush()?;
        errors.flush()?;
        log::info!(
            "Validated {} files: {} statements, {} with errors, {} corrupted",
            summary.file_count(),
            summary.total_statements(),
            summary.total_failed(),
            summary.total_corrupted()
        );
        Ok(summary)
    }

    fn run_sequential(
        &self,
        files: &[PathBuf],
        stats: &mut StatsLedger,
        errors: &mut ErrorLedger,
    ) -> Result<RunSummary, Error> {
        let mut summary = RunSummary::default();
        for (position, path) in files.iter().enumerate() {
            log_progress(position, files.len(), path);
            let report = self.processor.process(path);
            report.record(stats, errors)?;
            summary.files.push(report.stats);
        }
        Ok(summary)
    }

    /// Process files on a scoped pool; rows are still written in discovery order
    fn run_pool(
        &self,
        files: &[PathBuf],
        stats: &mut StatsLedger,
        errors: &mut ErrorLedger,
    ) -> Result<RunSummary, Error> {
        let workers = self.jobs.min(files.len());
        log::debug!("Processing {} files on {workers} workers", files.len());

        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, FileReport)>();

        thread::scope(|scope| -> Result<RunSummary, Error> {
            for worker in 0..workers {
                let tx = tx.clone();
                let next = &next;
                thread::Builder::new()
                    .name(format!("corpus-worker-{worker}"))
                    .stack_size(PARSE_STACK_SIZE)
                    .spawn_scoped(scope, move || loop {
                        let position = next.fetch_add(1, Ordering::Relaxed);
                        let Some(path) = files.get(position) else {
                            break;
                        };
                        log_progress(position, files.len(), path);
                        let report = self.processor.process(path);
                        if tx.send((position, report)).is_err() {
                            break;
                        }
                    })
                    .map_err(|err| Error::StatementFault {
                        message: format!("failed to start corpus worker: {err}"),
                    })?;
            }
            drop(tx);

            let mut summary = RunSummary::default();
            let mut pending = BTreeMap::new();
            for (position, report) in rx {
                pending.insert(position, report);
                while let Some(report) = pending.remove(&summary.files.len()) {
                    report.record(stats, errors)?;
                    summary.files.push(report.stats);
                }
            }
            Ok(summary)
        })
    }
}

fn log_progress(position: usize, total: usize, path: &Path) {
    log::info!(
        "Processing file {}/{total}: {}",
        position + 1,
        path.file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
    );
}
