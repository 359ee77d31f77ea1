//! Run configuration
//!
//! A [`Config`] can be built in code with the builder methods or loaded from
//! a JSON file. Paths that are not set explicitly are derived from the
//! output directory.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the configured start rule
pub const START_RULE_ENV: &str = "SQL_CORPUS_START_RULE";

/// Per-statement timeout used by the exporter when none is configured
pub const DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 30;

/// Whole-file timeout used by the exporter when none is configured
pub const DEFAULT_FILE_TIMEOUT_SECS: u64 = 180;

/// Name of the error ledger inside the output directory
pub const ERROR_LEDGER_NAME: &str = "errors.csv";

fn default_start_rule() -> String {
    crate::validator::DEFAULT_START_RULE.to_string()
}

fn default_extension() -> String {
    "txt".to_string()
}

fn default_jobs() -> usize {
    1
}

/// Configuration for validation and export runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned (non-recursively) for corpus files
    pub input_dir: PathBuf,

    /// Directory receiving error dumps and the error ledger
    pub output_dir: PathBuf,

    /// Statistics ledger (defaults to `{output_dir}/error_stats.csv`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_ledger: Option<PathBuf>,

    /// Grammar start rule
    #[serde(default = "default_start_rule")]
    pub start_rule: String,

    /// Extension of corpus files, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Per-statement parse timeout in seconds (0 disables it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement_timeout_secs: Option<u64>,

    /// Whole-file parse timeout in seconds for exports (0 disables it)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_timeout_secs: Option<u64>,

    /// Number of files validated concurrently
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Directory receiving parse documents (defaults to `{output_dir}/json_trees`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_dir: Option<PathBuf>,

    /// Export run summary (defaults to `{output_dir}/export_summary.csv`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_ledger: Option<PathBuf>,

    /// Export timeout log (defaults to `{output_dir}/timeout_log.txt`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_log: Option<PathBuf>,
}

impl Config {
    /// Create a configuration with defaults for everything but the directories
    #[must_use]
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            stats_ledger: None,
            start_rule: default_start_rule(),
            extension: default_extension(),
            statement_timeout_secs: None,
            file_timeout_secs: None,
            jobs: default_jobs(),
            json_dir: None,
            summary_ledger: None,
            timeout_log: None,
        }
    }

    /// Load a configuration from a JSON file and apply environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// holds invalid values.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        let config: Self = serde_json::from_str(&text).map_err(|err| Error::Config {
            message: format!("{}: {err}", path.display()),
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        let config = config.with_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up by environment variable name
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(rule) = lookup(START_RULE_ENV).filter(|rule| !rule.trim().is_empty()) {
            log::debug!("Start rule overridden via {START_RULE_ENV}: {rule}");
            self.start_rule = rule.trim().to_string();
        }
        self
    }

    /// Check that the configured values are usable
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), Error> {
        if self.start_rule.trim().is_empty() {
            return Err(Error::Config {
                message: "start_rule must not be empty".to_string(),
            });
        }
        if self.extension.trim().is_empty() {
            return Err(Error::Config {
                message: "extension must not be empty".to_string(),
            });
        }
        if self.jobs == 0 {
            return Err(Error::Config {
                message: "jobs must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Builder method to set the statistics ledger path
    #[must_use]
    pub fn with_stats_ledger(mut self, path: impl Into<PathBuf>) -> Self {
        self.stats_ledger = Some(path.into());
        self
    }

    /// Builder method to set the start rule
    #[must_use]
    pub fn with_start_rule(mut self, rule: impl Into<String>) -> Self {
        self.start_rule = rule.into();
        self
    }

    /// Builder method to set the corpus file extension
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Builder method to set the per-statement timeout
    #[must_use]
    pub fn with_statement_timeout_secs(mut self, secs: u64) -> Self {
        self.statement_timeout_secs = Some(secs);
        self
    }

    /// Builder method to set the whole-file timeout
    #[must_use]
    pub fn with_file_timeout_secs(mut self, secs: u64) -> Self {
        self.file_timeout_secs = Some(secs);
        self
    }

    /// Builder method to set the number of concurrent files
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Builder method to set the parse document directory
    #[must_use]
    pub fn with_json_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.json_dir = Some(path.into());
        self
    }

    /// Builder method to set the export run summary path
    #[must_use]
    pub fn with_summary_ledger(mut self, path: impl Into<PathBuf>) -> Self {
        self.summary_ledger = Some(path.into());
        self
    }

    /// Builder method to set the timeout log path
    #[must_use]
    pub fn with_timeout_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.timeout_log = Some(path.into());
        self
    }

    #[must_use]
    pub fn stats_ledger_path(&self) -> PathBuf {
        self.stats_ledger
            .clone()
            .unwrap_or_else(|| self.output_dir.join("error_stats.csv"))
    }

    #[must_use]
    pub fn error_ledger_path(&self) -> PathBuf {
        self.output_dir.join(ERROR_LEDGER_NAME)
    }

    #[must_use]
    pub fn json_dir_path(&self) -> PathBuf {
        self.json_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("json_trees"))
    }

    #[must_use]
    pub fn summary_ledger_path(&self) -> PathBuf {
        self.summary_ledger
            .clone()
            .unwrap_or_else(|| self.output_dir.join("export_summary.csv"))
    }

    #[must_use]
    pub fn timeout_log_path(&self) -> PathBuf {
        self.timeout_log
            .clone()
            .unwrap_or_else(|| self.output_dir.join("timeout_log.txt"))
    }

    /// Per-statement timeout for validation runs (none unless configured)
    #[must_use]
    pub fn validation_timeout(&self) -> Option<Duration> {
        seconds(self.statement_timeout_secs)
    }

    /// Per-statement timeout for export fallbacks
    #[must_use]
    pub fn export_statement_timeout(&self) -> Option<Duration> {
        seconds(Some(
            self.statement_timeout_secs
                .unwrap_or(DEFAULT_STATEMENT_TIMEOUT_SECS),
        ))
    }

    /// Whole-file timeout for exports
    #[must_use]
    pub fn export_file_timeout(&self) -> Option<Duration> {
        seconds(Some(
            self.file_timeout_secs.unwrap_or(DEFAULT_FILE_TIMEOUT_SECS),
        ))
    }
}

fn seconds(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|secs| *secs > 0).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("in", "out");
        assert_eq!(config.start_rule, "parse");
        assert_eq!(config.extension, "txt");
        assert_eq!(config.jobs, 1);
        assert_eq!(config.stats_ledger_path(), Path::new("out/error_stats.csv"));
        assert_eq!(config.error_ledger_path(), Path::new("out/errors.csv"));
        assert_eq!(config.json_dir_path(), Path::new("out/json_trees"));
        assert_eq!(config.validation_timeout(), None);
        assert_eq!(
            config.export_statement_timeout(),
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.export_file_timeout(), Some(Duration::from_secs(180)));
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = Config::new("in", "out")
            .with_statement_timeout_secs(0)
            .with_file_timeout_secs(0);
        assert_eq!(config.export_statement_timeout(), None);
        assert_eq!(config.export_file_timeout(), None);
    }

    #[test]
    fn test_from_file_minimal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"input_dir": "corpus", "output_dir": "out", "jobs": 4, "statement_timeout_secs": 5}"#,
        )
        .expect("write");

        let config = Config::from_file(&path).expect("load");
        assert_eq!(config.input_dir, PathBuf::from("corpus"));
        assert_eq!(config.jobs, 4);
        assert_eq!(config.validation_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.extension, "txt");
    }

    #[test]
    fn test_from_file_rejects_bad_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"input_dir": "a", "output_dir": "b", "jobs": 0}"#)
            .expect("write");
        assert!(matches!(
            Config::from_file(&path),
            Err(Error::Config { .. })
        ));

        std::fs::write(&path, "{ not json").expect("write");
        assert!(matches!(
            Config::from_file(&path),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_env_override() {
        let config = Config::new("in", "out").with_env_overrides(|name| {
            (name == START_RULE_ENV).then(|| "sql_stmt".to_string())
        });
        assert_eq!(config.start_rule, "sql_stmt");

        let config = Config::new("in", "out").with_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(config.start_rule, "parse");
    }

    #[test]
    fn test_roundtrip_keeps_unset_paths_unset() {
        let config = Config::new("in", "out").with_jobs(2);
        let json = serde_json::to_string(&config).expect("serialize");
        assert!(!json.contains("json_dir"));
        let back: Config = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, config);
    }
}
