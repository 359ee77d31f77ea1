//! Parse-tree export
//!
//! The [`Exporter`] parses each corpus file as a whole and writes the result
//! as a JSON [`ParseDocument`]. When the whole-file parse fails or runs out
//! of time, the file is split on `;` and every statement is parsed on its
//! own; whatever parses is combined into a partial document.

use crate::config::Config;
use crate::corpus::discover_files;
use crate::document::{DocumentStatus, Metadata, NodeKind, ParseDocument, TreeNode};
use crate::error::Error;
use crate::extract::{build_document, extract_tokens, extract_tree};
use crate::grammar::{self, Grammar, ParseAttempt};
use crate::ledger::SummaryLedger;
use crate::validator::{guarded_parse, on_parse_stack};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Characters of a failed statement kept in logs and metadata
const FAILED_QUERY_PREVIEW: usize = 100;

/// Outcome of exporting one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportStatus {
    Success,
    Partial,
    CompleteFailure,
}

impl fmt::Display for ExportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::Partial => f.write_str("PARTIAL"),
            Self::CompleteFailure => f.write_str("COMPLETE_FAILURE"),
        }
    }
}

/// One row of the run summary ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub filename: String,
    pub duration_seconds: u64,
    /// Name of the written document, or `FAILED`
    pub output_document: String,
    pub status: ExportStatus,
}

/// Files and statements that could not be parsed during a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeoutLog {
    pub files: Vec<String>,
    pub queries: Vec<String>,
}

impl TimeoutLog {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.queries.is_empty()
    }

    /// Render the log with the given generation time (Unix seconds)
    #[must_use]
    pub fn render(&self, generated: u64) -> String {
        let mut text = String::new();
        let _ = writeln!(text, "=== TIMEOUT LOG ===");
        let _ = writeln!(text, "Generated: {generated}");
        let _ = writeln!(text);
        let _ = writeln!(text, "FILES THAT TIMED OUT ({}):", self.files.len());
        for file in &self.files {
            let _ = writeln!(text, "- {file}");
        }
        let _ = writeln!(text);
        let _ = writeln!(text, "QUERIES THAT TIMED OUT ({}):", self.queries.len());
        for query in &self.queries {
            let _ = writeln!(text, "- {query}");
        }
        text
    }

    /// Write the log to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write(&self, path: &Path) -> Result<(), Error> {
        let generated = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        fs::write(path, self.render(generated)).map_err(|err| Error::io(path, err))
    }
}

/// Result of an export run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// One record per file, in discovery order
    pub records: Vec<ExportRecord>,
    pub timeout_log: TimeoutLog,
}

impl ExportSummary {
    /// Number of files with the given status
    #[must_use]
    pub fn count(&self, status: ExportStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .count()
    }
}

/// Exports parse documents for a corpus
#[derive(Clone)]
pub struct Exporter {
    grammar: Arc<dyn Grammar>,
    start_rule: String,
    file_timeout: Option<Duration>,
    statement_timeout: Option<Duration>,
    input_dir: PathBuf,
    extension: String,
    output_dir: PathBuf,
    json_dir: PathBuf,
    summary_ledger: PathBuf,
    timeout_log: PathBuf,
}

impl Exporter {
    /// Create an exporter for the run described by `config`, using the built-in grammar
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_grammar(config, grammar::builtin())
    }

    /// Create an exporter for the run described by `config`
    #[must_use]
    pub fn with_grammar(config: &Config, grammar: Arc<dyn Grammar>) -> Self {
        Self {
            grammar,
            start_rule: config.start_rule.clone(),
            file_timeout: config.export_file_timeout(),
            statement_timeout: config.export_statement_timeout(),
            input_dir: config.input_dir.clone(),
            extension: config.extension.clone(),
            output_dir: config.output_dir.clone(),
            json_dir: config.json_dir_path(),
            summary_ledger: config.summary_ledger_path(),
            timeout_log: config.timeout_log_path(),
        }
    }

    /// Export every corpus file, then write the run summary and timeout log
    ///
    /// # Errors
    ///
    /// Returns an error if the output directories cannot be created, the
    /// input directory cannot be listed, or the summary ledger or timeout
    /// log cannot be written.
    pub fn run(&self) -> Result<ExportSummary, Error> {
        for dir in [&self.output_dir, &self.json_dir] {
            fs::create_dir_all(dir).map_err(|source| Error::OutputDirectory {
                path: dir.clone(),
                source,
            })?;
        }

        let files = discover_files(&self.input_dir, &self.extension)?;
        log::info!(
            "Exporting parse trees for {} files into {}",
            files.len(),
            self.json_dir.display()
        );

        let mut ledger = SummaryLedger::create(&self.summary_ledger)?;
        let run_started = Instant::now();

        let summary = on_parse_stack("export", || {
            let mut summary = ExportSummary::default();
            for (position, path) in files.iter().enumerate() {
                log::info!("Processing file {}/{}: {}", position + 1, files.len(), path.display());
                let record = self.export_file(path, &mut summary.timeout_log);
                ledger.append(&record)?;
                summary.records.push(record);
            }
            Ok(summary)
        })?;

        ledger.flush()?;
        summary.timeout_log.write(&self.timeout_log)?;
        log::info!(
            "Export finished in {}s: {} complete, {} partial, {} failed; {} files and {} statements timed out or failed",
            run_started.elapsed().as_secs(),
            summary.count(ExportStatus::Success),
            summary.count(ExportStatus::Partial),
            summary.count(ExportStatus::CompleteFailure),
            summary.timeout_log.files.len(),
            summary.timeout_log.queries.len()
        );
        Ok(summary)
    }

    /// Export one file, writing its document into the JSON directory
    pub fn export_file(&self, path: &Path, timeout_log: &mut TimeoutLog) -> ExportRecord {
        let started = Instant::now();
        let filename = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
        let stem = path
            .file_stem()
            .map_or_else(|| filename.clone(), |stem| stem.to_string_lossy().into_owned());

        let failed = |duration_seconds| ExportRecord {
            filename: filename.clone(),
            duration_seconds,
            output_document: "FAILED".to_string(),
            status: ExportStatus::CompleteFailure,
        };

        let input = match fs::read_to_string(path) {
            Ok(input) => input,
            Err(err) => {
                log::error!("Error reading {}: {err}", path.display());
                return failed(started.elapsed().as_secs());
            }
        };

        let Some(mut document) = self.export_text(&filename, &input, timeout_log) else {
            log::warn!("{filename} completely failed processing");
            return failed(started.elapsed().as_secs());
        };

        let duration_seconds = started.elapsed().as_secs();
        document.metadata.set_processing_seconds(duration_seconds);
        let (output_document, status) = match document.metadata.status {
            DocumentStatus::Success => (format!("{stem}.json"), ExportStatus::Success),
            DocumentStatus::Partial => (format!("{stem}_partial.json"), ExportStatus::Partial),
        };

        let target = self.json_dir.join(&output_document);
        if let Err(err) = write_document(&target, &document) {
            log::error!("Could not write {}: {err}", target.display());
            return failed(duration_seconds);
        }
        log::info!(
            "{filename} took {duration_seconds}s - {} tokens - Status: {status}",
            document.metadata.total_tokens
        );

        ExportRecord {
            filename,
            duration_seconds,
            output_document,
            status,
        }
    }

    /// Build the document for one file's text, falling back to per-statement parsing
    ///
    /// Returns `None` when not a single statement could be parsed.
    pub fn export_text(
        &self,
        filename: &str,
        input: &str,
        timeout_log: &mut TimeoutLog,
    ) -> Option<ParseDocument> {
        match guarded_parse(&self.grammar, input, &self.start_rule, self.file_timeout) {
            Ok(ParseAttempt::Parsed(parsed)) => {
                return Some(build_document(filename, &parsed, self.grammar.as_ref()));
            }
            Ok(ParseAttempt::Rejected(diagnostics)) => {
                let first = diagnostics
                    .first()
                    .map_or_else(String::new, ToString::to_string);
                log::warn!("{filename} did not parse as a whole ({first}); parsing statement by statement");
            }
            Err(err) => {
                log::warn!("{filename}: {err}; parsing statement by statement");
                timeout_log.files.push(filename.to_string());
            }
        }
        self.export_by_statement(filename, input, timeout_log)
    }

    fn export_by_statement(
        &self,
        filename: &str,
        input: &str,
        timeout_log: &mut TimeoutLog,
    ) -> Option<ParseDocument> {
        let pieces: Vec<&str> = input.split(';').collect();
        let mut token_stream = Vec::new();
        let mut trees = Vec::new();
        let mut failed_queries = Vec::new();

        for (position, piece) in pieces.iter().enumerate() {
            let statement = piece.trim();
            if statement.is_empty() {
                continue;
            }
            let identifier = format!("{filename}_query_{}", position + 1);
            log::debug!("Processing statement {}/{}", position + 1, pieces.len());

            let attempt =
                guarded_parse(&self.grammar, statement, &self.start_rule, self.statement_timeout);
            let reason = match attempt {
                Ok(ParseAttempt::Parsed(parsed)) => {
                    let offset = token_stream.len();
                    let mut tokens = extract_tokens(&parsed.tokens, self.grammar.as_ref());
                    for token in &mut tokens {
                        token.index += offset;
                    }
                    token_stream.extend(tokens);
                    trees.push(extract_tree(&parsed.tree, &parsed.tokens, self.grammar.as_ref()));
                    continue;
                }
                Ok(ParseAttempt::Rejected(diagnostics)) => diagnostics
                    .first()
                    .map_or_else(|| "rejected".to_string(), ToString::to_string),
                Err(err) => err.to_string(),
            };

            log::warn!("{identifier} failed: {reason}");
            let entry = failed_query_entry(&identifier, statement);
            timeout_log.queries.push(entry.clone());
            failed_queries.push(entry);
        }

        if trees.is_empty() {
            return None;
        }
        log::info!(
            "Parsed {} of {} statements from {filename}",
            trees.len(),
            trees.len() + failed_queries.len()
        );

        let input_length = i64::try_from(input.chars().count()).unwrap_or(i64::MAX);
        let parse_tree = TreeNode::new(
            NodeKind::Unknown,
            "CombinedQueries",
            "Multiple queries",
            0,
            input_length,
        )
        .with_children(trees);

        let mut metadata = Metadata::new(filename, token_stream.len(), DocumentStatus::Partial);
        metadata.failed_queries = failed_queries;
        Some(ParseDocument {
            metadata,
            token_stream,
            parse_tree,
        })
    }
}

impl fmt::Debug for Exporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exporter")
            .field("grammar", &self.grammar.name())
            .field("start_rule", &self.start_rule)
            .field("file_timeout", &self.file_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .field("input_dir", &self.input_dir)
            .field("json_dir", &self.json_dir)
            .finish_non_exhaustive()
    }
}

/// `"{identifier}: {first 100 characters}..."`
fn failed_query_entry(identifier: &str, statement: &str) -> String {
    let preview: String = statement.chars().take(FAILED_QUERY_PREVIEW).collect();
    format!("{identifier}: {preview}...")
}

fn write_document(path: &Path, document: &ParseDocument) -> Result<(), Error> {
    let json = document.to_json_pretty()?;
    fs::write(path, json).map_err(|err| Error::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::testing::{FaultyGrammar, HANG_MARKER, PANIC_MARKER};

    struct Fixture {
        _dir: tempfile::TempDir,
        config: Config,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("corpus");
        fs::create_dir(&input).expect("create input");
        for (name, content) in files {
            fs::write(input.join(name), content).expect("write corpus file");
        }
        let config = Config::new(input, dir.path().join("out"));
        Fixture { _dir: dir, config }
    }

    fn read_json(path: &Path) -> serde_json::Value {
        let text = fs::read_to_string(path).expect("read document");
        serde_json::from_str(&text).expect("valid JSON")
    }

    #[test]
    fn test_failed_query_entry_truncates() {
        let long = "x".repeat(150);
        let entry = failed_query_entry("a.txt_query_3", &long);
        assert_eq!(entry, format!("a.txt_query_3: {}...", "x".repeat(100)));
        assert_eq!(failed_query_entry("q", "SELEC 1"), "q: SELEC 1...");
    }

    #[test]
    fn test_timeout_log_render() {
        let log = TimeoutLog {
            files: vec!["big.txt".to_string()],
            queries: vec!["big.txt_query_2: SELEC...".to_string()],
        };
        assert_eq!(
            log.render(1_700_000_000),
            "=== TIMEOUT LOG ===\nGenerated: 1700000000\n\n\
             FILES THAT TIMED OUT (1):\n- big.txt\n\n\
             QUERIES THAT TIMED OUT (1):\n- big.txt_query_2: SELEC...\n"
        );
    }

    #[test]
    fn test_whole_file_success() {
        let fx = fixture(&[("a.txt", "SELECT a FROM t;\nDELETE FROM u;\n")]);
        let summary = Exporter::new(&fx.config).run().expect("run");

        assert_eq!(summary.records.len(), 1);
        let record = &summary.records[0];
        assert_eq!(record.status, ExportStatus::Success);
        assert_eq!(record.output_document, "a.json");

        let value = read_json(&fx.config.json_dir_path().join("a.json"));
        assert_eq!(value["metadata"]["filename"], "a.txt");
        assert_eq!(value["metadata"]["status"], "SUCCESS");
        assert_eq!(value["metadata"]["processingTime"], "0s");
        assert!(value["metadata"].get("failedQueries").is_none());
        assert_eq!(value["parseTree"]["nodeType"], "RuleContext: parse");
        let tokens = value["tokenStream"].as_array().expect("tokens");
        assert_eq!(value["metadata"]["totalTokens"], tokens.len());
        assert_eq!(tokens.last().expect("eof")["typeName"], "EOF");

        let ledger = fs::read_to_string(fx.config.summary_ledger_path()).expect("ledger");
        assert_eq!(
            ledger,
            "FileName,DurationSeconds,JsonFile,Status\na.txt,0,a.json,SUCCESS\n"
        );
        let log = fs::read_to_string(fx.config.timeout_log_path()).expect("log");
        assert!(log.contains("FILES THAT TIMED OUT (0):"));
    }

    #[test]
    fn test_partial_document() {
        let fx = fixture(&[("b.txt", "SELECT 1;\nSELEC 2;\n\nSELECT 3;")]);
        let summary = Exporter::new(&fx.config).run().expect("run");

        let record = &summary.records[0];
        assert_eq!(record.status, ExportStatus::Partial);
        assert_eq!(record.output_document, "b_partial.json");
        assert_eq!(summary.timeout_log.queries, vec!["b.txt_query_2: SELEC 2..."]);
        assert!(summary.timeout_log.files.is_empty());

        let value = read_json(&fx.config.json_dir_path().join("b_partial.json"));
        assert_eq!(value["metadata"]["status"], "PARTIAL");
        assert_eq!(value["metadata"]["failedQueries"][0], "b.txt_query_2: SELEC 2...");

        let tree = &value["parseTree"];
        assert_eq!(tree["nodeType"], "Unknown: CombinedQueries");
        assert_eq!(tree["text"], "Multiple queries");
        assert_eq!(tree["startIndex"], 0);
        assert_eq!(tree["stopIndex"], "SELECT 1;\nSELEC 2;\n\nSELECT 3;".len());
        assert_eq!(tree["children"].as_array().expect("children").len(), 2);

        let tokens = value["tokenStream"].as_array().expect("tokens");
        for (position, token) in tokens.iter().enumerate() {
            assert_eq!(token["index"], position);
        }
    }

    #[test]
    fn test_complete_failure() {
        let fx = fixture(&[("c.txt", "SELEC 1;\nUPDAT t;")]);
        let summary = Exporter::new(&fx.config).run().expect("run");

        let record = &summary.records[0];
        assert_eq!(record.status, ExportStatus::CompleteFailure);
        assert_eq!(record.output_document, "FAILED");
        assert_eq!(summary.timeout_log.queries.len(), 2);
        let ledger = fs::read_to_string(fx.config.summary_ledger_path()).expect("ledger");
        assert!(ledger.ends_with("c.txt,0,FAILED,COMPLETE_FAILURE\n"));
    }

    #[test]
    fn test_file_timeout_falls_back() {
        let content = format!("SELECT 1;\nSELECT {HANG_MARKER};\nSELECT 2;");
        let fx = fixture(&[("slow.txt", content.as_str())]);
        let config = fx
            .config
            .clone()
            .with_file_timeout_secs(1)
            .with_statement_timeout_secs(1);
        let summary = Exporter::with_grammar(&config, Arc::new(FaultyGrammar::new()))
            .run()
            .expect("run");

        assert_eq!(summary.timeout_log.files, vec!["slow.txt"]);
        assert_eq!(summary.timeout_log.queries.len(), 1);
        assert!(summary.timeout_log.queries[0].starts_with("slow.txt_query_2: "));
        assert_eq!(summary.records[0].status, ExportStatus::Partial);
    }

    #[test]
    fn test_panicking_file_falls_back() {
        let content = format!("SELECT 1;\nSELECT {PANIC_MARKER};");
        let fx = fixture(&[("p.txt", content.as_str())]);
        let summary = Exporter::with_grammar(&fx.config, Arc::new(FaultyGrammar::new()))
            .run()
            .expect("run");

        assert_eq!(summary.timeout_log.files, vec!["p.txt"]);
        assert_eq!(summary.records[0].status, ExportStatus::Partial);
    }

    #[test]
    fn test_unreadable_file_is_complete_failure() {
        let fx = fixture(&[("b.txt", "SELECT 1;")]);
        fs::write(fx.config.input_dir.join("a.txt"), [0xff, 0xfe, b'S', 0x80]).expect("write bytes");
        let summary = Exporter::new(&fx.config).run().expect("run");

        assert_eq!(summary.records.len(), 2);
        assert_eq!(summary.records[0].status, ExportStatus::CompleteFailure);
        assert_eq!(summary.records[1].status, ExportStatus::Success);
        let ledger = fs::read_to_string(fx.config.summary_ledger_path()).expect("ledger");
        assert_eq!(
            ledger,
            "FileName,DurationSeconds,JsonFile,Status\n\
             a.txt,0,FAILED,COMPLETE_FAILURE\n\
             b.txt,0,b.json,SUCCESS\n"
        );
        assert!(fx.config.json_dir_path().join("b.json").exists());
    }

    fn nested_statement(depth: usize) -> String {
        format!("SELECT {}1{} FROM t;", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn test_deep_statement_exports() {
        let deep = nested_statement(400);
        let fx = fixture(&[("a.txt", deep.as_str()), ("b.txt", "SELECT 1;")]);
        let summary = Exporter::new(&fx.config).run().expect("run");

        assert_eq!(summary.count(ExportStatus::Success), 2);
        assert!(summary.timeout_log.is_empty());
        let document =
            ParseDocument::from_file(fx.config.json_dir_path().join("a.json")).expect("read back");
        assert_eq!(document.token_stream.len(), 1 + 400 + 1 + 400 + 3 + 1);
        assert_eq!(document.tokens_named("(").count(), 400);
        assert_eq!(document.parse_tree.node_type(), "RuleContext: parse");
    }

    #[test]
    fn test_parser_limit_falls_back() {
        let content = format!("SELECT 1;\n{}", nested_statement(1_000_000));
        let fx = fixture(&[("d.txt", content.as_str())]);
        let summary = Exporter::new(&fx.config).run().expect("run");

        assert_eq!(summary.timeout_log.files, vec!["d.txt"]);
        assert_eq!(summary.timeout_log.queries.len(), 1);
        assert!(summary.timeout_log.queries[0].starts_with("d.txt_query_2: SELECT (((("));
        assert_eq!(summary.records[0].status, ExportStatus::Partial);
    }
}
