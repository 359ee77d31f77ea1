//! The grammar-based parser capability
//!
//! Validation and extraction never talk to a concrete parser directly. They
//! drive a [`Grammar`], which turns text into either a token stream plus a
//! derivation tree, or a list of syntax diagnostics. [`SqlGrammar`] is the
//! built-in implementation.

mod sql;
#[cfg(test)]
pub(crate) mod testing;

pub use sql::{SqlGrammar, PARSE_CALL_LIMIT};

use crate::error::Error;
use crate::types::Diagnostic;
use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::sync::Arc;

/// Token type of the end-of-input token
pub const EOF_TYPE: i32 = -1;

/// Channel for tokens the parser consumes
pub const DEFAULT_CHANNEL: u32 = 0;

/// Channel for tokens the parser skips (comments)
pub const HIDDEN_CHANNEL: u32 = 1;

/// A lexical token produced by a grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token type, resolved to a name through the [`Vocabulary`]
    pub token_type: i32,
    /// Matched text
    pub text: String,
    /// Character offset of the first character
    pub start: i64,
    /// Character offset of the last character (`start - 1` for empty tokens)
    pub stop: i64,
    /// Line number (1-based)
    pub line: usize,
    /// Column of the first character (0-based)
    pub column: usize,
    /// Token channel
    pub channel: u32,
}

/// A node of the derivation tree produced by a grammar
///
/// The node kind is an explicit discriminator so consumers never need to
/// inspect runtime types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseNode {
    /// An internal node for a grammar production
    Rule {
        /// Index into [`Grammar::rule_names`]
        rule_index: usize,
        /// Stream index of the first token covered, if any
        start_token: Option<usize>,
        /// Stream index of the last token covered, if any
        stop_token: Option<usize>,
        /// Children, left to right
        children: Vec<ParseNode>,
    },
    /// A leaf wrapping exactly one token
    Terminal {
        /// Stream index of the token
        token_index: usize,
    },
    /// Any other node a grammar may surface
    Other {
        /// Runtime category of the node
        category: String,
        /// Children, left to right
        children: Vec<ParseNode>,
    },
}

impl ParseNode {
    /// Children of this node (empty for terminals)
    #[must_use]
    pub fn children(&self) -> &[ParseNode] {
        match self {
            Self::Rule { children, .. } | Self::Other { children, .. } => children,
            Self::Terminal { .. } => &[],
        }
    }
}

/// A successful parse: the filled token stream and the tree root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInput {
    pub tokens: Vec<Token>,
    pub tree: ParseNode,
}

/// What a single parse call produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseAttempt {
    /// The input was accepted
    Parsed(ParsedInput),
    /// The input was rejected with syntax diagnostics
    Rejected(Vec<Diagnostic>),
}

/// Maps token types to display names
///
/// Follows the usual generated-parser convention: a token type has a literal
/// name (`'SELECT'`), a symbolic name (`IDENTIFIER`), or both. The display
/// name prefers the literal.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    literal_names: Vec<Option<String>>,
    symbolic_names: Vec<Option<String>>,
}

impl Vocabulary {
    /// Create a vocabulary; index `i` describes token type `i`
    #[must_use]
    pub fn new(literal_names: Vec<Option<String>>, symbolic_names: Vec<Option<String>>) -> Self {
        Self {
            literal_names,
            symbolic_names,
        }
    }

    /// Highest token type described by this vocabulary
    #[must_use]
    pub fn max_token_type(&self) -> usize {
        self.literal_names
            .len()
            .max(self.symbolic_names.len())
            .saturating_sub(1)
    }

    #[must_use]
    pub fn literal_name(&self, token_type: i32) -> Option<&str> {
        let index = usize::try_from(token_type).ok()?;
        self.literal_names.get(index)?.as_deref()
    }

    #[must_use]
    pub fn symbolic_name(&self, token_type: i32) -> Option<&str> {
        if token_type == EOF_TYPE {
            return Some("EOF");
        }
        let index = usize::try_from(token_type).ok()?;
        self.symbolic_names.get(index)?.as_deref()
    }

    /// Human-readable name for a token type
    #[must_use]
    pub fn display_name(&self, token_type: i32) -> Cow<'_, str> {
        if let Some(literal) = self.literal_name(token_type) {
            return Cow::Borrowed(literal);
        }
        if let Some(symbolic) = self.symbolic_name(token_type) {
            return Cow::Borrowed(symbolic);
        }
        Cow::Owned(token_type.to_string())
    }
}

/// A grammar-based parser capability
pub trait Grammar: Send + Sync {
    /// Grammar name, used in logs and errors
    fn name(&self) -> &str;

    /// Production names, indexed by [`ParseNode::Rule::rule_index`]
    fn rule_names(&self) -> &[&'static str];

    /// Token type display names
    fn vocabulary(&self) -> &Vocabulary;

    /// Parse `input` starting from the production named `start_rule`
    ///
    /// Syntax errors are returned as [`ParseAttempt::Rejected`]; `Err` is
    /// reserved for failures of the parser itself.
    fn parse(&self, input: &str, start_rule: &str) -> Result<ParseAttempt, Error>;

    /// Check whether `name` can be used as a start rule
    fn has_rule(&self, name: &str) -> bool {
        self.rule_names().contains(&name)
    }

    /// Name of the production at `rule_index`
    fn rule_name(&self, rule_index: usize) -> Option<&str> {
        self.rule_names().get(rule_index).copied()
    }
}

static BUILTIN: OnceCell<Arc<SqlGrammar>> = OnceCell::new();

/// Shared instance of the built-in [`SqlGrammar`]
#[must_use]
pub fn builtin() -> Arc<dyn Grammar> {
    let grammar = BUILTIN.get_or_init(|| {
        log::debug!("Initializing built-in SQL grammar");
        Arc::new(SqlGrammar::new())
    });
    Arc::clone(grammar) as Arc<dyn Grammar>
}
