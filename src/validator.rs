//! Statement validation against a grammar
//!
//! This module drives a [`Grammar`] for one statement at a time and turns
//! whatever happens into data: syntax errors become diagnostics, parser
//! panics and expired deadlines become statement faults.

use crate::error::Error;
use crate::grammar::{self, Grammar, ParseAttempt};
use crate::types::{Diagnostic, ValidationOutcome};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Default start rule for whole statements
pub const DEFAULT_START_RULE: &str = "parse";

/// Stack size of every thread that runs parses
///
/// Parsers recurse with the nesting depth of their input, so parse threads
/// get far more stack than the platform default.
pub const PARSE_STACK_SIZE: usize = 64 * 1024 * 1024;

/// Statement validator
///
/// Each call produces its own [`ValidationOutcome`]; nothing is shared
/// between calls, so one validator can be used from several threads.
///
/// # Example
///
/// ```
/// use sql_corpus_tools::StatementValidator;
///
/// fn main() -> Result<(), sql_corpus_tools::Error> {
///     let validator = StatementValidator::builtin();
///
///     let outcome = validator.validate("SELECT a FROM t\n")?;
///     assert!(outcome.is_valid());
///
///     let outcome = validator.validate("SELEC a FROM t\n")?;
///     for diagnostic in outcome.diagnostics() {
///         println!("{diagnostic}");
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct StatementValidator {
    grammar: Arc<dyn Grammar>,
    start_rule: String,
    timeout: Option<Duration>,
}

impl StatementValidator {
    /// Create a validator for `grammar` using the default start rule and no timeout
    #[must_use]
    pub fn new(grammar: Arc<dyn Grammar>) -> Self {
        Self {
            grammar,
            start_rule: DEFAULT_START_RULE.to_string(),
            timeout: None,
        }
    }

    /// Create a validator backed by the built-in SQL grammar
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(grammar::builtin())
    }

    /// Set the start rule
    #[must_use]
    pub fn with_start_rule(mut self, start_rule: impl Into<String>) -> Self {
        self.start_rule = start_rule.into();
        self
    }

    /// Set the per-statement timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn grammar(&self) -> &Arc<dyn Grammar> {
        &self.grammar
    }

    #[must_use]
    pub fn start_rule(&self) -> &str {
        &self.start_rule
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Check whether the configured start rule exists in the grammar
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.grammar.has_rule(&self.start_rule)
    }

    /// Validate one statement
    ///
    /// The statement is passed to the grammar exactly as given; callers
    /// processing split corpus files terminate it with a newline first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StatementFault`] if the parser panicked,
    /// [`Error::ParseLimit`] if it ran out of call budget or stack, and
    /// [`Error::Timeout`] if the parse did not finish in time. Any other
    /// grammar error is reported as a single diagnostic at `1:0`.
    pub fn validate(&self, statement: &str) -> Result<ValidationOutcome, Error> {
        match guarded_parse(&self.grammar, statement, &self.start_rule, self.timeout) {
            Ok(ParseAttempt::Parsed(_)) => Ok(ValidationOutcome::Valid),
            Ok(ParseAttempt::Rejected(diagnostics)) => Ok(ValidationOutcome::invalid(diagnostics)),
            Err(err) if err.is_statement_fault() => Err(err),
            Err(err) => {
                log::debug!("{} raised an error, recording it as a diagnostic: {err}", self.grammar.name());
                Ok(ValidationOutcome::invalid(vec![Diagnostic::new(
                    1,
                    0,
                    err.to_string(),
                )]))
            }
        }
    }
}

impl std::fmt::Debug for StatementValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementValidator")
            .field("grammar", &self.grammar.name())
            .field("start_rule", &self.start_rule)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Run one parse call, converting panics and an expired deadline into errors
///
/// Without a timeout the parse runs on the calling thread. With one, it runs
/// on a helper thread with [`PARSE_STACK_SIZE`] of stack; a parse that misses
/// the deadline is abandoned and left to finish on its own.
pub(crate) fn guarded_parse(
    grammar: &Arc<dyn Grammar>,
    input: &str,
    start_rule: &str,
    timeout: Option<Duration>,
) -> Result<ParseAttempt, Error> {
    let Some(limit) = timeout else {
        return catch_parse(grammar.as_ref(), input, start_rule);
    };

    let (tx, rx) = mpsc::channel();
    let worker_grammar = Arc::clone(grammar);
    let worker_input = input.to_string();
    let worker_rule = start_rule.to_string();
    thread::Builder::new()
        .name("parse-deadline".to_string())
        .stack_size(PARSE_STACK_SIZE)
        .spawn(move || {
            let result = catch_parse(worker_grammar.as_ref(), &worker_input, &worker_rule);
            // The receiver is gone once the deadline has passed.
            let _ = tx.send(result);
        })
        .map_err(|err| Error::StatementFault {
            message: format!("failed to start parse thread: {err}"),
        })?;

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("Parse abandoned after {}s", limit.as_secs());
            Err(Error::Timeout { limit })
        }
        Err(RecvTimeoutError::Disconnected) => Err(Error::StatementFault {
            message: "parse thread exited without a result".to_string(),
        }),
    }
}

/// Run `work` on a scoped thread with [`PARSE_STACK_SIZE`] of stack
///
/// Used by the batch runners so that every parse they start, with or
/// without a timeout, sees the same stack.
pub(crate) fn on_parse_stack<T, F>(name: &str, work: F) -> Result<T, Error>
where
    T: Send,
    F: FnOnce() -> Result<T, Error> + Send,
{
    thread::scope(|scope| -> Result<T, Error> {
        let handle = thread::Builder::new()
            .name(name.to_string())
            .stack_size(PARSE_STACK_SIZE)
            .spawn_scoped(scope, work)
            .map_err(|err| Error::StatementFault {
                message: format!("failed to start {name} thread: {err}"),
            })?;
        handle
            .join()
            .unwrap_or_else(|payload| Err(Error::from_panic(payload.as_ref())))
    })
}

fn catch_parse(
    grammar: &dyn Grammar,
    input: &str,
    start_rule: &str,
) -> Result<ParseAttempt, Error> {
    panic::catch_unwind(AssertUnwindSafe(|| grammar.parse(input, start_rule)))
        .unwrap_or_else(|payload| Err(Error::from_panic(payload.as_ref())))
}
