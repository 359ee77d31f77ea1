//! Parse document model
//!
//! A [`ParseDocument`] is the serializable form of one parse: metadata, the
//! full token stream and the derivation tree. The JSON layout matches what
//! downstream lineage tooling reads, and exported documents can be loaded
//! back with [`ParseDocument::from_json`].

use crate::error::Error;
use crate::validator::on_parse_stack;
use serde::de::{self, Deserializer};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::Path;

/// Status recorded in a document's metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentStatus {
    /// The whole input parsed in one call
    Success,
    /// Only some statements of the input parsed
    Partial,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("SUCCESS"),
            Self::Partial => f.write_str("PARTIAL"),
        }
    }
}

/// One token of the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    /// Position in the stream
    pub index: usize,
    /// Token type id (`-1` for end of input)
    #[serde(rename = "type")]
    pub type_id: i32,
    /// Vocabulary name with literal quotes removed
    pub type_name: String,
    pub text: String,
    #[serde(rename = "startIndex")]
    pub start_offset: i64,
    #[serde(rename = "stopIndex")]
    pub stop_offset: i64,
    pub line: usize,
    pub column: usize,
    pub channel: u32,
}

/// Kind of a tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Rule,
    Terminal,
    Unknown,
}

impl NodeKind {
    fn prefix(self) -> &'static str {
        match self {
            Self::Rule => "RuleContext",
            Self::Terminal => "Terminal",
            Self::Unknown => "Unknown",
        }
    }

    /// Split a serialized `nodeType` into its kind and label
    ///
    /// ```
    /// use sql_corpus_tools::NodeKind;
    ///
    /// assert_eq!(
    ///     NodeKind::parse_node_type("RuleContext: select_stmt"),
    ///     Some((NodeKind::Rule, "select_stmt"))
    /// );
    /// assert_eq!(NodeKind::parse_node_type("Leaf: x"), None);
    /// ```
    #[must_use]
    pub fn parse_node_type(node_type: &str) -> Option<(Self, &str)> {
        [Self::Rule, Self::Terminal, Self::Unknown]
            .into_iter()
            .find_map(|kind| {
                node_type
                    .strip_prefix(kind.prefix())
                    .and_then(|rest| rest.strip_prefix(": "))
                    .map(|label| (kind, label))
            })
    }
}

/// A node of the exported tree
///
/// Serializes as `{"nodeType": "<Kind>: <label>", "text", "children",
/// "startIndex", "stopIndex"}`. Dropping a node releases its subtree
/// without recursion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// Rule name, token name, or runtime category
    pub label: String,
    pub text: String,
    /// Character offset of the first character, `-1` if absent
    pub start_offset: i64,
    /// Character offset of the last character, `-1` if absent
    pub stop_offset: i64,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Create a leaf node
    #[must_use]
    pub fn new(
        kind: NodeKind,
        label: impl Into<String>,
        text: impl Into<String>,
        start_offset: i64,
        stop_offset: i64,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            text: text.into(),
            start_offset,
            stop_offset,
            children: Vec::new(),
        }
    }

    /// Add a child
    #[must_use]
    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    /// Add children
    #[must_use]
    pub fn with_children(mut self, children: impl IntoIterator<Item = TreeNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// The serialized `nodeType` value
    #[must_use]
    pub fn node_type(&self) -> String {
        format!("{}: {}", self.kind.prefix(), self.label)
    }

    /// Number of nodes in this subtree, including this one
    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TreeNode", 5)?;
        state.serialize_field("nodeType", &self.node_type())?;
        state.serialize_field("text", &self.text)?;
        state.serialize_field("children", &self.children)?;
        state.serialize_field("startIndex", &self.start_offset)?;
        state.serialize_field("stopIndex", &self.stop_offset)?;
        state.end()
    }
}

/// Wire form of a [`TreeNode`]
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNode {
    node_type: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    children: Vec<TreeNode>,
    start_index: i64,
    stop_index: i64,
}

impl<'de> Deserialize<'de> for TreeNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = WireNode::deserialize(deserializer)?;
        let (kind, label) = NodeKind::parse_node_type(&wire.node_type).ok_or_else(|| {
            de::Error::custom(format!("unrecognized nodeType '{}'", wire.node_type))
        })?;
        Ok(Self {
            kind,
            label: label.to_string(),
            text: wire.text,
            start_offset: wire.start_index,
            stop_offset: wire.stop_index,
            children: wire.children,
        })
    }
}

/// Document metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub filename: String,
    pub total_tokens: usize,
    /// Whole seconds with an `s` suffix, e.g. `"3s"`
    pub processing_time: String,
    pub status: DocumentStatus,
    /// Statements that could not be parsed (partial documents only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_queries: Vec<String>,
}

impl Metadata {
    #[must_use]
    pub fn new(filename: impl Into<String>, total_tokens: usize, status: DocumentStatus) -> Self {
        Self {
            filename: filename.into(),
            total_tokens,
            processing_time: "0s".to_string(),
            status,
            failed_queries: Vec::new(),
        }
    }

    /// Record the processing duration in whole seconds
    pub fn set_processing_seconds(&mut self, seconds: u64) {
        self.processing_time = format!("{seconds}s");
    }
}

/// A complete parse document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseDocument {
    pub metadata: Metadata,
    pub token_stream: Vec<TokenInfo>,
    pub parse_tree: TreeNode,
}

impl ParseDocument {
    /// Serialize as pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a document from its JSON form
    ///
    /// Parse trees nest far deeper than serde_json's default limit, so the
    /// limit is lifted and the document is read on a parse-sized stack.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a parse document.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        on_parse_stack("document-reader", || {
            let mut deserializer = serde_json::Deserializer::from_str(json);
            deserializer.disable_recursion_limit();
            let document = Self::deserialize(&mut deserializer)?;
            deserializer.end()?;
            Ok(document)
        })
    }

    /// Load a document written by the exporter
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a parse document.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
        Self::from_json(&json)
    }

    /// Tokens whose type name is `type_name`
    pub fn tokens_named<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a TokenInfo> + 'a {
        self.token_stream
            .iter()
            .filter(move |token| token.type_name == type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> TreeNode {
        TreeNode::new(NodeKind::Rule, "sql_stmt", "SELECT1", 0, 7).with_children([
            TreeNode::new(NodeKind::Terminal, "'SELECT'", "SELECT", 0, 5),
            TreeNode::new(NodeKind::Terminal, "NUMERIC_LITERAL", "1", 7, 7),
        ])
    }

    #[test]
    fn test_tree_node_wire_format() {
        let value = serde_json::to_value(sample_tree()).expect("serialize");
        assert_eq!(value["nodeType"], "RuleContext: sql_stmt");
        assert_eq!(value["startIndex"], 0);
        assert_eq!(value["stopIndex"], 7);
        assert_eq!(value["children"][0]["nodeType"], "Terminal: 'SELECT'");
        assert_eq!(value["children"][1]["children"], json!([]));
    }

    #[test]
    fn test_token_wire_format() {
        let token = TokenInfo {
            index: 0,
            type_id: 39,
            type_name: "SELECT".to_string(),
            text: "SELECT".to_string(),
            start_offset: 0,
            stop_offset: 5,
            line: 1,
            column: 0,
            channel: 0,
        };
        let value = serde_json::to_value(&token).expect("serialize");
        assert_eq!(
            value,
            json!({
                "index": 0,
                "type": 39,
                "typeName": "SELECT",
                "text": "SELECT",
                "startIndex": 0,
                "stopIndex": 5,
                "line": 1,
                "column": 0,
                "channel": 0
            })
        );
    }

    #[test]
    fn test_metadata_failed_queries_only_when_present() {
        let mut metadata = Metadata::new("a.txt", 3, DocumentStatus::Success);
        metadata.set_processing_seconds(2);
        let value = serde_json::to_value(&metadata).expect("serialize");
        assert_eq!(value["processingTime"], "2s");
        assert_eq!(value["status"], "SUCCESS");
        assert!(value.get("failedQueries").is_none());

        metadata.status = DocumentStatus::Partial;
        metadata.failed_queries.push("a.txt_query_2: SELEC 1...".to_string());
        let value = serde_json::to_value(&metadata).expect("serialize");
        assert_eq!(value["status"], "PARTIAL");
        assert_eq!(value["failedQueries"][0], "a.txt_query_2: SELEC 1...");
    }

    #[test]
    fn test_document_keys() {
        let document = ParseDocument {
            metadata: Metadata::new("a.txt", 0, DocumentStatus::Success),
            token_stream: Vec::new(),
            parse_tree: sample_tree(),
        };
        let text = document.to_json_pretty().expect("serialize");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse back");
        assert!(value.get("metadata").is_some());
        assert!(value["tokenStream"].is_array());
        assert_eq!(value["parseTree"]["nodeType"], "RuleContext: sql_stmt");
    }

    #[test]
    fn test_deep_tree_drops_without_overflow() {
        let mut root = TreeNode::new(NodeKind::Rule, "expr", "", -1, -1);
        for _ in 0..200_000 {
            root = TreeNode::new(NodeKind::Rule, "expr", "", -1, -1).with_child(root);
        }
        assert_eq!(root.node_count(), 200_001);
        drop(root);
    }

    #[test]
    fn test_parse_node_type() {
        assert_eq!(
            NodeKind::parse_node_type("Terminal: 'SELECT'"),
            Some((NodeKind::Terminal, "'SELECT'"))
        );
        assert_eq!(
            NodeKind::parse_node_type("Unknown: CombinedQueries"),
            Some((NodeKind::Unknown, "CombinedQueries"))
        );
        assert_eq!(NodeKind::parse_node_type("RuleContext:parse"), None);
    }

    #[test]
    fn test_document_reads_back() {
        let mut metadata = Metadata::new("a.txt", 1, DocumentStatus::Partial);
        metadata.failed_queries.push("a.txt_query_2: SELEC...".to_string());
        let document = ParseDocument {
            metadata,
            token_stream: vec![TokenInfo {
                index: 0,
                type_id: -1,
                type_name: "EOF".to_string(),
                text: "<EOF>".to_string(),
                start_offset: 8,
                stop_offset: 7,
                line: 1,
                column: 8,
                channel: 0,
            }],
            parse_tree: TreeNode::new(NodeKind::Unknown, "CombinedQueries", "Multiple queries", 0, 8)
                .with_child(sample_tree()),
        };

        let loaded = ParseDocument::from_json(&document.to_json_pretty().expect("serialize"))
            .expect("read back");
        assert_eq!(loaded, document);
        assert_eq!(loaded.tokens_named("EOF").count(), 1);
    }

    #[test]
    fn test_deep_document_reads_back() {
        let mut root = TreeNode::new(NodeKind::Terminal, "NUMERIC_LITERAL", "1", 0, 0);
        for _ in 0..5_000 {
            root = TreeNode::new(NodeKind::Rule, "paren_expr", "", 0, 0).with_child(root);
        }
        let document = ParseDocument {
            metadata: Metadata::new("deep.txt", 0, DocumentStatus::Success),
            token_stream: Vec::new(),
            parse_tree: root,
        };
        let json = on_parse_stack("serialize", || Ok(serde_json::to_string(&document)?))
            .expect("serialize");
        let loaded = ParseDocument::from_json(&json).expect("read back");
        assert_eq!(loaded.parse_tree.node_count(), 5_001);
    }

    #[test]
    fn test_unrecognized_node_type_is_rejected() {
        let json = json!({
            "metadata": {"filename": "a.txt", "totalTokens": 0, "processingTime": "0s", "status": "SUCCESS"},
            "tokenStream": [],
            "parseTree": {"nodeType": "Leaf: x", "text": "", "children": [], "startIndex": 0, "stopIndex": 0}
        });
        let err = ParseDocument::from_json(&json.to_string()).expect_err("bad nodeType");
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().contains("Leaf: x"));
    }
}
