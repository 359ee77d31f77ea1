//! Validation types for SQL Corpus Tools

use serde::{Deserialize, Serialize};
use std::fmt;

/// A syntax diagnostic reported while parsing one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (0-based, character position in line)
    pub column: usize,
    /// The diagnostic message
    pub message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }

    /// Summary used by the error ledger: the rendered diagnostic up to the
    /// first `-`, trimmed.
    #[must_use]
    pub fn ledger_prefix(&self) -> String {
        let rendered = self.to_string();
        rendered
            .split('-')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}:{} - {}", self.line, self.column, self.message)
    }
}

/// Result of validating one statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The statement parsed without diagnostics
    Valid,
    /// The statement was rejected by the grammar
    Invalid {
        /// Diagnostics in detection order
        diagnostics: Vec<Diagnostic>,
    },
}

impl ValidationOutcome {
    /// Create an invalid outcome from the given diagnostics
    #[must_use]
    pub fn invalid(diagnostics: Vec<Diagnostic>) -> Self {
        Self::Invalid { diagnostics }
    }

    /// Check if the statement is valid
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Get all diagnostics (empty for valid statements)
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Valid => &[],
            Self::Invalid { diagnostics } => diagnostics,
        }
    }
}

/// A statement that failed validation, kept until the file's error dump is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStatement {
    /// Statement text as handed to the validator (newline-terminated)
    pub text: String,
    /// Diagnostics from the failed parse
    pub diagnostics: Vec<Diagnostic>,
}

impl FailedStatement {
    /// Error ledger summary for this statement; empty if no diagnostic was recorded
    #[must_use]
    pub fn ledger_prefix(&self) -> String {
        self.diagnostics
            .first()
            .map(Diagnostic::ledger_prefix)
            .unwrap_or_default()
    }
}

/// Per-file validation statistics, one row of the statistics ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStats {
    /// File name including extension
    pub file_name: String,
    /// Number of statements found in the file
    pub total_statements: usize,
    /// Statements rejected by the grammar
    pub failed_statements: usize,
    /// Statements whose validation faulted, or 1 for an unreadable file
    pub corrupted_statements: usize,
    /// `failed / total * 100`, rounded to two decimals
    pub error_percentage: f64,
    /// Whole seconds spent on the file
    pub elapsed_seconds: u64,
}

impl FileStats {
    /// Build stats from raw counts, deriving the error percentage
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        total_statements: usize,
        failed_statements: usize,
        corrupted_statements: usize,
        elapsed_seconds: u64,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            total_statements,
            failed_statements,
            corrupted_statements,
            error_percentage: error_percentage(failed_statements, total_statements),
            elapsed_seconds,
        }
    }

    /// Stats for a file that could not be processed at all
    #[must_use]
    pub fn unreadable(file_name: impl Into<String>, elapsed_seconds: u64) -> Self {
        Self::new(file_name, 0, 0, 1, elapsed_seconds)
    }

    /// Statements that parsed successfully
    #[must_use]
    pub fn valid_statements(&self) -> usize {
        self.total_statements
            .saturating_sub(self.failed_statements + self.corrupted_statements)
    }
}

/// Percentage of failed statements, rounded to two decimals; 0 for an empty file
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn error_percentage(failed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = failed as f64 / total as f64 * 100.0;
    (raw * 100.0).round() / 100.0
}
