//! Misbehaving grammar used by tests across the crate

use super::{Grammar, ParseAttempt, SqlGrammar, Vocabulary};
use crate::error::Error;
use std::thread;
use std::time::Duration;

/// Statements containing this marker make the parser panic
pub const PANIC_MARKER: &str = "PANIC_NOW";

/// Statements containing this marker make the parser stall
pub const HANG_MARKER: &str = "HANG_NOW";

/// Statements containing this marker make the parser return an error
pub const ERROR_MARKER: &str = "FAIL_NOW";

/// How long a stalled parse sleeps before giving up
pub const HANG_DURATION: Duration = Duration::from_secs(2);

/// Wraps [`SqlGrammar`] and misbehaves on marked inputs
#[derive(Debug, Default)]
pub struct FaultyGrammar {
    inner: SqlGrammar,
}

impl FaultyGrammar {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Grammar for FaultyGrammar {
    fn name(&self) -> &str {
        "Faulty"
    }

    fn rule_names(&self) -> &[&'static str] {
        self.inner.rule_names()
    }

    fn vocabulary(&self) -> &Vocabulary {
        self.inner.vocabulary()
    }

    fn parse(&self, input: &str, start_rule: &str) -> Result<ParseAttempt, Error> {
        assert!(!input.contains(PANIC_MARKER), "parser blew up");
        if input.contains(ERROR_MARKER) {
            return Err(Error::Grammar {
                message: "call limit exceeded".to_string(),
            });
        }
        if input.contains(HANG_MARKER) {
            thread::sleep(HANG_DURATION);
        }
        self.inner.parse(input, start_rule)
    }
}
