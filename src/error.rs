//! Error types for SQL Corpus Tools

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while validating or exporting a corpus
#[derive(Debug, Error)]
pub enum Error {
    /// A file or directory operation failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The output directory could not be created at run start
    #[error("Failed to create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The requested start rule does not exist in the grammar
    #[error("Unknown start rule '{rule}' for grammar {grammar}")]
    UnknownStartRule { rule: String, grammar: String },

    /// The grammar raised an error that is not a syntax diagnostic
    #[error("Grammar error: {message}")]
    Grammar { message: String },

    /// The parser panicked while handling one statement
    #[error("Parser fault: {message}")]
    StatementFault { message: String },

    /// The parser ran out of call budget or stack space
    #[error("Parser limit reached: {message}")]
    ParseLimit { message: String },

    /// A parse call did not finish within its deadline
    #[error("Parse timed out after {}s", .limit.as_secs())]
    Timeout { limit: Duration },

    /// The configuration could not be loaded
    #[error("Invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    /// Create an I/O error for the given path
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a statement fault from a caught panic payload
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "parser panicked".to_string()
        };
        Self::StatementFault { message }
    }

    /// Whether this error is a statement-level fault (counted as corrupted)
    #[must_use]
    pub fn is_statement_fault(&self) -> bool {
        matches!(
            self,
            Self::StatementFault { .. } | Self::ParseLimit { .. } | Self::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_panic_payloads() {
        let err = Error::from_panic(&"boom");
        assert_eq!(err.to_string(), "Parser fault: boom");

        let err = Error::from_panic(&String::from("owned boom"));
        assert_eq!(err.to_string(), "Parser fault: owned boom");

        let err = Error::from_panic(&42_u32);
        assert_eq!(err.to_string(), "Parser fault: parser panicked");
    }

    #[test]
    fn test_statement_fault_classification() {
        assert!(Error::Timeout {
            limit: Duration::from_secs(30)
        }
        .is_statement_fault());
        assert!(Error::StatementFault {
            message: String::new()
        }
        .is_statement_fault());
        assert!(Error::ParseLimit {
            message: "stack limit reached".to_string()
        }
        .is_statement_fault());
        assert!(!Error::Grammar {
            message: String::new()
        }
        .is_statement_fault());
    }

    #[test]
    fn test_timeout_message() {
        let err = Error::Timeout {
            limit: Duration::from_secs(30),
        };
        assert_eq!(err.to_string(), "Parse timed out after 30s");
    }
}
