//! Token and tree extraction
//!
//! Converts a grammar's [`ParsedInput`] into the document model. The tree
//! walk keeps its own work stack, so deeply nested input never grows the
//! call stack.

use crate::document::{DocumentStatus, Metadata, NodeKind, ParseDocument, TokenInfo, TreeNode};
use crate::grammar::{Grammar, ParseNode, ParsedInput, Token, HIDDEN_CHANNEL};

/// Label for a rule index the grammar does not name
const UNNAMED_RULE: &str = "<unknown rule>";

/// Label for a terminal whose token is missing from the stream
const MISSING_TOKEN: &str = "<missing>";

/// Strip the quotes from a literal token name (`'SELECT'` becomes `SELECT`)
#[must_use]
pub fn strip_literal_quotes(name: &str) -> &str {
    name.strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .filter(|inner| !inner.is_empty())
        .unwrap_or(name)
}

/// Extract the token stream in order, resolving type names through the vocabulary
#[must_use]
pub fn extract_tokens(tokens: &[Token], grammar: &dyn Grammar) -> Vec<TokenInfo> {
    let vocabulary = grammar.vocabulary();
    tokens
        .iter()
        .enumerate()
        .map(|(index, token)| {
            let display = vocabulary.display_name(token.token_type);
            TokenInfo {
                index,
                type_id: token.token_type,
                type_name: strip_literal_quotes(&display).to_string(),
                text: token.text.clone(),
                start_offset: token.start,
                stop_offset: token.stop,
                line: token.line,
                column: token.column,
                channel: token.channel,
            }
        })
        .collect()
}

enum Visit<'t> {
    Enter(&'t ParseNode),
    Exit(&'t ParseNode),
}

/// A finished subtree and whether its text counts towards the parent's text
struct Built {
    node: TreeNode,
    visible: bool,
}

/// Convert the derivation tree into [`TreeNode`]s
///
/// Children are finished before their parent, so each node's text is the
/// concatenation of its visible children's texts.
#[must_use]
pub fn extract_tree(root: &ParseNode, tokens: &[Token], grammar: &dyn Grammar) -> TreeNode {
    let vocabulary = grammar.vocabulary();
    let mut work = vec![Visit::Enter(root)];
    let mut built: Vec<Built> = Vec::new();

    while let Some(visit) = work.pop() {
        match visit {
            Visit::Enter(ParseNode::Terminal { token_index }) => {
                let finished = match tokens.get(*token_index) {
                    Some(token) => Built {
                        node: TreeNode::new(
                            NodeKind::Terminal,
                            vocabulary.display_name(token.token_type),
                            token.text.clone(),
                            token.start,
                            token.stop,
                        ),
                        visible: token.channel != HIDDEN_CHANNEL,
                    },
                    None => {
                        log::warn!("Terminal refers to missing token {token_index}");
                        Built {
                            node: TreeNode::new(NodeKind::Terminal, MISSING_TOKEN, "", -1, -1),
                            visible: true,
                        }
                    }
                };
                built.push(finished);
            }
            Visit::Enter(node) => {
                work.push(Visit::Exit(node));
                for child in node.children().iter().rev() {
                    work.push(Visit::Enter(child));
                }
            }
            Visit::Exit(node) => {
                let child_count = node.children().len();
                let children = built.split_off(built.len().saturating_sub(child_count));
                let text: String = children
                    .iter()
                    .filter(|child| child.visible)
                    .map(|child| child.node.text.as_str())
                    .collect();

                let shell = match node {
                    ParseNode::Rule {
                        rule_index,
                        start_token,
                        stop_token,
                        ..
                    } => TreeNode::new(
                        NodeKind::Rule,
                        grammar.rule_name(*rule_index).unwrap_or(UNNAMED_RULE),
                        text,
                        token_bound(tokens, *start_token, |token| token.start),
                        token_bound(tokens, *stop_token, |token| token.stop),
                    ),
                    ParseNode::Other { category, .. } => {
                        TreeNode::new(NodeKind::Unknown, category.as_str(), text, -1, -1)
                    }
                    ParseNode::Terminal { .. } => unreachable!("terminals finish on entry"),
                };
                built.push(Built {
                    node: shell.with_children(children.into_iter().map(|child| child.node)),
                    visible: true,
                });
            }
        }
    }

    built
        .pop()
        .map_or_else(|| TreeNode::new(NodeKind::Unknown, "Empty", "", -1, -1), |b| b.node)
}

fn token_bound(tokens: &[Token], index: Option<usize>, offset: impl Fn(&Token) -> i64) -> i64 {
    index.and_then(|i| tokens.get(i)).map_or(-1, offset)
}

/// Build a [`ParseDocument`] with status `SUCCESS` for a successful parse
#[must_use]
pub fn build_document(filename: &str, parsed: &ParsedInput, grammar: &dyn Grammar) -> ParseDocument {
    let token_stream = extract_tokens(&parsed.tokens, grammar);
    let parse_tree = extract_tree(&parsed.tree, &parsed.tokens, grammar);
    log::trace!(
        "Extracted {} tokens and {} tree nodes from {filename}",
        token_stream.len(),
        parse_tree.node_count()
    );
    ParseDocument {
        metadata: Metadata::new(filename, token_stream.len(), DocumentStatus::Success),
        token_stream,
        parse_tree,
    }
}
