//! Built-in SQL grammar backed by a pest-generated parser

use super::{
    Grammar, ParseAttempt, ParseNode, ParsedInput, Token, Vocabulary, DEFAULT_CHANNEL, EOF_TYPE,
    HIDDEN_CHANNEL,
};
use crate::error::Error;
use crate::types::Diagnostic;
use once_cell::sync::Lazy;
use pest::error::{ErrorVariant, LineColLocation};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use std::collections::HashMap;
use std::num::NonZeroUsize;

/// Cumulative pest call budget for a single parse
pub const PARSE_CALL_LIMIT: usize = 50_000_000;

#[derive(Parser)]
#[grammar = "grammar/sql.pest"]
struct TeraSqlParser;

/// Grammar productions, in grammar order. The position is the rule index.
const PRODUCTIONS: &[(Rule, &str)] = &[
    (Rule::parse, "parse"),
    (Rule::sql_stmt, "sql_stmt"),
    (Rule::select_stmt, "select_stmt"),
    (Rule::compound_operator, "compound_operator"),
    (Rule::select_core, "select_core"),
    (Rule::set_quantifier, "set_quantifier"),
    (Rule::top_clause, "top_clause"),
    (Rule::result_columns, "result_columns"),
    (Rule::result_column, "result_column"),
    (Rule::table_star, "table_star"),
    (Rule::column_alias, "column_alias"),
    (Rule::from_clause, "from_clause"),
    (Rule::table_source, "table_source"),
    (Rule::subquery_source, "subquery_source"),
    (Rule::table_name, "table_name"),
    (Rule::table_alias, "table_alias"),
    (Rule::join_clause, "join_clause"),
    (Rule::join_operator, "join_operator"),
    (Rule::join_constraint, "join_constraint"),
    (Rule::where_clause, "where_clause"),
    (Rule::group_by_clause, "group_by_clause"),
    (Rule::having_clause, "having_clause"),
    (Rule::qualify_clause, "qualify_clause"),
    (Rule::order_by_clause, "order_by_clause"),
    (Rule::ordering_term, "ordering_term"),
    (Rule::insert_stmt, "insert_stmt"),
    (Rule::column_list, "column_list"),
    (Rule::values_clause, "values_clause"),
    (Rule::value_row, "value_row"),
    (Rule::update_stmt, "update_stmt"),
    (Rule::assignment, "assignment"),
    (Rule::delete_stmt, "delete_stmt"),
    (Rule::create_table_stmt, "create_table_stmt"),
    (Rule::table_kind, "table_kind"),
    (Rule::create_as_select, "create_as_select"),
    (Rule::column_defs, "column_defs"),
    (Rule::column_def, "column_def"),
    (Rule::column_constraint, "column_constraint"),
    (Rule::table_option, "table_option"),
    (Rule::drop_table_stmt, "drop_table_stmt"),
    (Rule::expr, "expr"),
    (Rule::expr_list, "expr_list"),
    (Rule::or_expr, "or_expr"),
    (Rule::and_expr, "and_expr"),
    (Rule::not_expr, "not_expr"),
    (Rule::predicate, "predicate"),
    (Rule::comparison_tail, "comparison_tail"),
    (Rule::is_null_tail, "is_null_tail"),
    (Rule::in_tail, "in_tail"),
    (Rule::between_tail, "between_tail"),
    (Rule::like_tail, "like_tail"),
    (Rule::concat_expr, "concat_expr"),
    (Rule::additive_expr, "additive_expr"),
    (Rule::multiplicative_expr, "multiplicative_expr"),
    (Rule::unary_expr, "unary_expr"),
    (Rule::primary, "primary"),
    (Rule::literal, "literal"),
    (Rule::date_literal, "date_literal"),
    (Rule::case_expr, "case_expr"),
    (Rule::when_clause, "when_clause"),
    (Rule::else_clause, "else_clause"),
    (Rule::cast_expr, "cast_expr"),
    (Rule::data_type, "data_type"),
    (Rule::exists_expr, "exists_expr"),
    (Rule::subquery_expr, "subquery_expr"),
    (Rule::paren_expr, "paren_expr"),
    (Rule::function_call, "function_call"),
    (Rule::over_clause, "over_clause"),
    (Rule::partition_by, "partition_by"),
    (Rule::column_ref, "column_ref"),
];

/// Token rules with their literal and symbolic names. Token type is position + 1.
const TOKENS: &[(Rule, Option<&str>, &str)] = &[
    (Rule::K_ALL, Some("'ALL'"), "K_ALL"),
    (Rule::K_AND, Some("'AND'"), "K_AND"),
    (Rule::K_AS, Some("'AS'"), "K_AS"),
    (Rule::K_BETWEEN, Some("'BETWEEN'"), "K_BETWEEN"),
    (Rule::K_BY, Some("'BY'"), "K_BY"),
    (Rule::K_CASE, Some("'CASE'"), "K_CASE"),
    (Rule::K_CAST, Some("'CAST'"), "K_CAST"),
    (Rule::K_CREATE, Some("'CREATE'"), "K_CREATE"),
    (Rule::K_CROSS, Some("'CROSS'"), "K_CROSS"),
    (Rule::K_DELETE, Some("'DELETE'"), "K_DELETE"),
    (Rule::K_DISTINCT, Some("'DISTINCT'"), "K_DISTINCT"),
    (Rule::K_DROP, Some("'DROP'"), "K_DROP"),
    (Rule::K_ELSE, Some("'ELSE'"), "K_ELSE"),
    (Rule::K_END, Some("'END'"), "K_END"),
    (Rule::K_EXCEPT, Some("'EXCEPT'"), "K_EXCEPT"),
    (Rule::K_EXISTS, Some("'EXISTS'"), "K_EXISTS"),
    (Rule::K_FROM, Some("'FROM'"), "K_FROM"),
    (Rule::K_FULL, Some("'FULL'"), "K_FULL"),
    (Rule::K_GROUP, Some("'GROUP'"), "K_GROUP"),
    (Rule::K_HAVING, Some("'HAVING'"), "K_HAVING"),
    (Rule::K_IN, Some("'IN'"), "K_IN"),
    (Rule::K_INNER, Some("'INNER'"), "K_INNER"),
    (Rule::K_INSERT, Some("'INSERT'"), "K_INSERT"),
    (Rule::K_INTERSECT, Some("'INTERSECT'"), "K_INTERSECT"),
    (Rule::K_INTO, Some("'INTO'"), "K_INTO"),
    (Rule::K_IS, Some("'IS'"), "K_IS"),
    (Rule::K_JOIN, Some("'JOIN'"), "K_JOIN"),
    (Rule::K_LEFT, Some("'LEFT'"), "K_LEFT"),
    (Rule::K_LIKE, Some("'LIKE'"), "K_LIKE"),
    (Rule::K_MINUS, Some("'MINUS'"), "K_MINUS"),
    (Rule::K_NOT, Some("'NOT'"), "K_NOT"),
    (Rule::K_NULL, Some("'NULL'"), "K_NULL"),
    (Rule::K_ON, Some("'ON'"), "K_ON"),
    (Rule::K_OR, Some("'OR'"), "K_OR"),
    (Rule::K_ORDER, Some("'ORDER'"), "K_ORDER"),
    (Rule::K_OUTER, Some("'OUTER'"), "K_OUTER"),
    (Rule::K_QUALIFY, Some("'QUALIFY'"), "K_QUALIFY"),
    (Rule::K_RIGHT, Some("'RIGHT'"), "K_RIGHT"),
    (Rule::K_SELECT, Some("'SELECT'"), "K_SELECT"),
    (Rule::K_SET, Some("'SET'"), "K_SET"),
    (Rule::K_TABLE, Some("'TABLE'"), "K_TABLE"),
    (Rule::K_THEN, Some("'THEN'"), "K_THEN"),
    (Rule::K_UNION, Some("'UNION'"), "K_UNION"),
    (Rule::K_UPDATE, Some("'UPDATE'"), "K_UPDATE"),
    (Rule::K_VALUES, Some("'VALUES'"), "K_VALUES"),
    (Rule::K_WHEN, Some("'WHEN'"), "K_WHEN"),
    (Rule::K_WHERE, Some("'WHERE'"), "K_WHERE"),
    (Rule::K_WITH, Some("'WITH'"), "K_WITH"),
    (Rule::K_ASC, Some("'ASC'"), "K_ASC"),
    (Rule::K_COMMIT, Some("'COMMIT'"), "K_COMMIT"),
    (Rule::K_DATA, Some("'DATA'"), "K_DATA"),
    (Rule::K_DATE, Some("'DATE'"), "K_DATE"),
    (Rule::K_DESC, Some("'DESC'"), "K_DESC"),
    (Rule::K_INDEX, Some("'INDEX'"), "K_INDEX"),
    (Rule::K_MULTISET, Some("'MULTISET'"), "K_MULTISET"),
    (Rule::K_NO, Some("'NO'"), "K_NO"),
    (Rule::K_OVER, Some("'OVER'"), "K_OVER"),
    (Rule::K_PARTITION, Some("'PARTITION'"), "K_PARTITION"),
    (Rule::K_PRESERVE, Some("'PRESERVE'"), "K_PRESERVE"),
    (Rule::K_PRIMARY, Some("'PRIMARY'"), "K_PRIMARY"),
    (Rule::K_ROWS, Some("'ROWS'"), "K_ROWS"),
    (Rule::K_TOP, Some("'TOP'"), "K_TOP"),
    (Rule::K_VOLATILE, Some("'VOLATILE'"), "K_VOLATILE"),
    (Rule::IDENTIFIER, None, "IDENTIFIER"),
    (Rule::NUMERIC_LITERAL, None, "NUMERIC_LITERAL"),
    (Rule::STRING_LITERAL, None, "STRING_LITERAL"),
    (Rule::SCOL, Some("';'"), "SCOL"),
    (Rule::DOT, Some("'.'"), "DOT"),
    (Rule::OPEN_PAR, Some("'('"), "OPEN_PAR"),
    (Rule::CLOSE_PAR, Some("')'"), "CLOSE_PAR"),
    (Rule::COMMA, Some("','"), "COMMA"),
    (Rule::EQ, Some("'='"), "EQ"),
    (Rule::STAR, Some("'*'"), "STAR"),
    (Rule::PLUS, Some("'+'"), "PLUS"),
    (Rule::MINUS, Some("'-'"), "MINUS"),
    (Rule::DIV, Some("'/'"), "DIV"),
    (Rule::MOD, Some("'%'"), "MOD"),
    (Rule::PIPE2, Some("'||'"), "PIPE2"),
    (Rule::LT_EQ, Some("'<='"), "LT_EQ"),
    (Rule::GT_EQ, Some("'>='"), "GT_EQ"),
    (Rule::NOT_EQ1, Some("'!='"), "NOT_EQ1"),
    (Rule::NOT_EQ2, Some("'<>'"), "NOT_EQ2"),
    (Rule::LT, Some("'<'"), "LT"),
    (Rule::GT, Some("'>'"), "GT"),
    (Rule::COMMENT, None, "COMMENT"),
];

static RULE_NAMES: Lazy<Vec<&'static str>> =
    Lazy::new(|| PRODUCTIONS.iter().map(|(_, name)| *name).collect());

static RULE_INDEX: Lazy<HashMap<Rule, usize>> = Lazy::new(|| {
    PRODUCTIONS
        .iter()
        .enumerate()
        .map(|(index, (rule, _))| (*rule, index))
        .collect()
});

static TOKEN_TYPE: Lazy<HashMap<Rule, i32>> = Lazy::new(|| {
    let mut types: HashMap<Rule, i32> = (1_i32..)
        .zip(TOKENS.iter())
        .map(|(token_type, (rule, _, _))| (*rule, token_type))
        .collect();
    types.insert(Rule::EOI, EOF_TYPE);
    types
});

// pest reads the limit when a parse starts; it is process-wide.
static CALL_LIMIT: Lazy<()> = Lazy::new(|| {
    log::debug!("Limiting pest parses to {PARSE_CALL_LIMIT} calls");
    pest::set_call_limit(NonZeroUsize::new(PARSE_CALL_LIMIT));
});

static VOCABULARY: Lazy<Vocabulary> = Lazy::new(|| {
    let mut literal_names = vec![None];
    let mut symbolic_names = vec![None];
    for (_, literal, symbolic) in TOKENS {
        literal_names.push(literal.map(str::to_string));
        symbolic_names.push(Some((*symbolic).to_string()));
    }
    Vocabulary::new(literal_names, symbolic_names)
});

/// The built-in Teradata-flavoured SQL grammar
///
/// Start rules are the production names (`parse` for whole inputs).
/// Comments are kept in the token stream on the hidden channel and left out
/// of the tree. Input that exhausts the parser's call budget or stack space
/// fails with [`Error::ParseLimit`].
///
/// # Example
///
/// ```
/// use sql_corpus_tools::{Grammar, ParseAttempt, SqlGrammar};
///
/// let grammar = SqlGrammar::new();
/// let attempt = grammar.parse("SELECT 1\n", "parse").unwrap();
/// assert!(matches!(attempt, ParseAttempt::Parsed(_)));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlGrammar;

impl SqlGrammar {
    /// Create the grammar
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Grammar for SqlGrammar {
    fn name(&self) -> &str {
        "TeraSql"
    }

    fn rule_names(&self) -> &[&'static str] {
        &RULE_NAMES
    }

    fn vocabulary(&self) -> &Vocabulary {
        &VOCABULARY
    }

    fn parse(&self, input: &str, start_rule: &str) -> Result<ParseAttempt, Error> {
        let rule = PRODUCTIONS
            .iter()
            .find(|(_, name)| *name == start_rule)
            .map(|(rule, _)| *rule)
            .ok_or_else(|| Error::UnknownStartRule {
                rule: start_rule.to_string(),
                grammar: self.name().to_string(),
            })?;

        Lazy::force(&CALL_LIMIT);
        match TeraSqlParser::parse(rule, input) {
            Ok(pairs) => Ok(ParseAttempt::Parsed(build_parsed_input(input, pairs))),
            // The grammar raises no custom errors, so these come from pest's limits.
            Err(pest::error::Error {
                variant: ErrorVariant::CustomError { message },
                ..
            }) => {
                log::warn!("{} gave up on input: {message}", self.name());
                Err(Error::ParseLimit { message })
            }
            Err(err) => {
                log::trace!("{} rejected input: {err}", self.name());
                Ok(ParseAttempt::Rejected(vec![to_diagnostic(err)]))
            }
        }
    }
}

/// Convert a pest error into a diagnostic, naming tokens the way the vocabulary does
fn to_diagnostic(err: pest::error::Error<Rule>) -> Diagnostic {
    let err = err.renamed_rules(|rule| display_rule(*rule));
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) | LineColLocation::Span(pos, _) => pos,
    };
    Diagnostic::new(line, column.saturating_sub(1), err.variant.message())
}

fn display_rule(rule: Rule) -> String {
    if let Some(token_type) = TOKEN_TYPE.get(&rule) {
        return VOCABULARY.display_name(*token_type).into_owned();
    }
    if let Some(index) = RULE_INDEX.get(&rule) {
        return RULE_NAMES[*index].to_string();
    }
    format!("{rule:?}")
}

/// Tracks byte, character, line and column positions while scanning forward
struct Cursor<'i> {
    input: &'i str,
    byte: usize,
    chars: i64,
    line: usize,
    column: usize,
}

impl<'i> Cursor<'i> {
    fn new(input: &'i str) -> Self {
        Self {
            input,
            byte: 0,
            chars: 0,
            line: 1,
            column: 0,
        }
    }

    fn advance_to(&mut self, byte: usize) {
        if byte <= self.byte {
            return;
        }
        for ch in self.input[self.byte..byte].chars() {
            self.chars += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        self.byte = byte;
    }
}

fn build_parsed_input(input: &str, pairs: Pairs<'_, Rule>) -> ParsedInput {
    let mut tokens = Vec::new();
    let mut token_at = HashMap::new();
    let mut cursor = Cursor::new(input);

    for pair in pairs.clone().flatten() {
        let Some(&token_type) = TOKEN_TYPE.get(&pair.as_rule()) else {
            continue;
        };
        let span = pair.as_span();
        cursor.advance_to(span.start());

        let text = if pair.as_rule() == Rule::EOI {
            "<EOF>".to_string()
        } else {
            span.as_str().to_string()
        };
        let width = i64::try_from(span.as_str().chars().count()).unwrap_or(i64::MAX);
        let channel = if pair.as_rule() == Rule::COMMENT {
            HIDDEN_CHANNEL
        } else {
            DEFAULT_CHANNEL
        };

        token_at.insert(span.start(), tokens.len());
        tokens.push(Token {
            token_type,
            text,
            start: cursor.chars,
            stop: cursor.chars + width - 1,
            line: cursor.line,
            column: cursor.column,
            channel,
        });
    }

    let mut roots: Vec<ParseNode> = pairs
        .filter_map(|pair| build_node(pair, &token_at).map(|(node, _)| node))
        .collect();

    let tree = if roots.len() == 1 {
        roots.remove(0)
    } else {
        ParseNode::Other {
            category: "Pairs".to_string(),
            children: roots,
        }
    };

    ParsedInput { tokens, tree }
}

/// First and last token indices covered by a node
type Bounds = Option<(usize, usize)>;

/// A rule pair whose children are still being built
struct Frame<'i> {
    rule: Rule,
    inner: Pairs<'i, Rule>,
    children: Vec<ParseNode>,
    bounds: Bounds,
}

impl Frame<'_> {
    fn push(&mut self, node: ParseNode, bounds: Bounds) {
        if let Some((first, last)) = bounds {
            self.bounds = Some(self.bounds.map_or((first, last), |(start, _)| (start, last)));
        }
        self.children.push(node);
    }

    fn finish(self) -> (ParseNode, Bounds) {
        let node = match RULE_INDEX.get(&self.rule) {
            Some(&rule_index) => ParseNode::Rule {
                rule_index,
                start_token: self.bounds.map(|(first, _)| first),
                stop_token: self.bounds.map(|(_, last)| last),
                children: self.children,
            },
            None => ParseNode::Other {
                category: format!("{:?}", self.rule),
                children: self.children,
            },
        };
        (node, self.bounds)
    }
}

enum Opened<'i> {
    Skipped,
    Leaf(ParseNode, Bounds),
    Open(Frame<'i>),
}

fn open<'i>(pair: Pair<'i, Rule>, token_at: &HashMap<usize, usize>) -> Opened<'i> {
    let rule = pair.as_rule();
    if rule == Rule::COMMENT {
        return Opened::Skipped;
    }

    if TOKEN_TYPE.contains_key(&rule) {
        if let Some(&token_index) = token_at.get(&pair.as_span().start()) {
            // End of input never counts toward a rule's stop token.
            let bounds = (rule != Rule::EOI).then_some((token_index, token_index));
            return Opened::Leaf(ParseNode::Terminal { token_index }, bounds);
        }
    }

    Opened::Open(Frame {
        rule,
        inner: pair.into_inner(),
        children: Vec::new(),
        bounds: None,
    })
}

/// Build the tree for one pair, returning the node and its first/last token indices
///
/// Nesting is tracked on an explicit stack, so deeply nested input does not
/// grow the call stack.
fn build_node(
    pair: Pair<'_, Rule>,
    token_at: &HashMap<usize, usize>,
) -> Option<(ParseNode, Bounds)> {
    let mut stack = match open(pair, token_at) {
        Opened::Skipped => return None,
        Opened::Leaf(node, bounds) => return Some((node, bounds)),
        Opened::Open(frame) => vec![frame],
    };

    while let Some(frame) = stack.last_mut() {
        if let Some(child) = frame.inner.next() {
            match open(child, token_at) {
                Opened::Skipped => {}
                Opened::Leaf(node, bounds) => frame.push(node, bounds),
                Opened::Open(child_frame) => stack.push(child_frame),
            }
            continue;
        }

        let (node, bounds) = stack.pop()?.finish();
        match stack.last_mut() {
            Some(parent) => parent.push(node, bounds),
            None => return Some((node, bounds)),
        }
    }
    None
}
