//! SQL Corpus Tools
//!
//! Batch validation of SQL corpora against a formal grammar, and export of
//! parse trees as JSON documents for downstream lineage analysis.
//!
//! ## Features
//!
//! - **Statement Validation**: Split corpus files on `;` and check every
//!   statement against a grammar, collecting positioned diagnostics
//! - **Corpus Statistics**: Per-file statistics and error ledgers, plus an
//!   error dump of the failing statements of each file
//! - **Parse-Tree Export**: Token streams and derivation trees as JSON, with
//!   per-statement fallback when a whole file cannot be parsed; exported
//!   documents load back with [`ParseDocument::from_file`]
//! - **Pluggable Grammars**: Anything implementing [`Grammar`] can be driven;
//!   [`SqlGrammar`] is built in
//!
//! ## Usage
//!
//! ```no_run
//! use sql_corpus_tools::{Config, CorpusValidator};
//!
//! fn main() -> Result<(), sql_corpus_tools::Error> {
//!     let config = Config::new("corpus", "output").with_jobs(4);
//!     let summary = CorpusValidator::new(&config).run()?;
//!
//!     for stats in &summary.files {
//!         println!(
//!             "{}: {}/{} statements failed ({:.2}%)",
//!             stats.file_name, stats.failed_statements, stats.total_statements, stats.error_percentage
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Outputs
//!
//! A validation run writes, into the output directory:
//!
//! 1. The statistics ledger (`error_stats.csv` unless configured otherwise)
//! 2. The error ledger `errors.csv`, one row per failed statement
//! 3. `{stem}_errors.txt` for every file with at least one failed statement

mod config;
mod corpus;
mod document;
mod error;
mod export;
mod extract;
mod grammar;
mod ledger;
mod processor;
mod splitter;
mod types;
mod validator;

pub use config::{Config, START_RULE_ENV};
pub use corpus::{discover_files, CorpusValidator, RunSummary};
pub use document::{DocumentStatus, Metadata, NodeKind, ParseDocument, TokenInfo, TreeNode};
pub use error::Error;
pub use export::{ExportRecord, ExportStatus, ExportSummary, Exporter, TimeoutLog};
pub use extract::{build_document, extract_tokens, extract_tree};
pub use grammar::{
    builtin as builtin_grammar, Grammar, ParseAttempt, ParseNode, ParsedInput, SqlGrammar, Token,
    Vocabulary, DEFAULT_CHANNEL, EOF_TYPE, HIDDEN_CHANNEL, PARSE_CALL_LIMIT,
};
pub use ledger::{
    escape_field, ErrorLedger, Ledger, StatsLedger, SummaryLedger, ERROR_HEADER, STATS_HEADER,
    SUMMARY_HEADER,
};
pub use processor::{render_dump, FileProcessor, FileReport, DUMP_BANNER};
pub use splitter::{normalize_line_endings, split_statements, terminate};
pub use types::{Diagnostic, FailedStatement, FileStats, ValidationOutcome};
pub use validator::{StatementValidator, DEFAULT_START_RULE, PARSE_STACK_SIZE};

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
