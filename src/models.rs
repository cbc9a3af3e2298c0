//! Core data models stored in and returned by the graph store.
//!
//! Nodes reference each other by surrogate integer key (`pk`), never by
//! pointer, so a parent and its children never own one another.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;
use crate::metadata::Metadata;

/// Edge type for hierarchical containment.
pub const EDGE_CONTAINS: &str = "contains";
/// Edge type for document-order adjacency between siblings.
pub const EDGE_NEXT: &str = "next";

/// Document submitted for registration.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: String,
    pub source_path: Option<String>,
    pub raw: Vec<u8>,
}

impl NewDocument {
    pub fn new(id: impl Into<String>, raw: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            source_path: None,
            raw: raw.into(),
        }
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// A registered document, including its raw bytes.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub source_path: Option<String>,
    /// Lowercase hex SHA-256 of `raw`.
    pub sha256: String,
    pub created_at: i64,
    pub raw: Vec<u8>,
}

/// Document row without the raw bytes.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub source_path: Option<String>,
    pub sha256: String,
    pub created_at: i64,
    pub byte_len: i64,
}

/// Result of registering a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterOutcome {
    Created,
    /// An existing document with the same id was replaced (`force` was set).
    Replaced,
}

/// Structural kind of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Doc,
    Heading,
    Paragraph,
    CodeBlock,
    /// Any other block kind produced by the tokenizer (e.g. `list`, `table`).
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Doc => "doc",
            NodeKind::Heading => "heading",
            NodeKind::Paragraph => "paragraph",
            NodeKind::CodeBlock => "codeblock",
            NodeKind::Other(s) => s,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(StoreError::InvalidInput("node kind must not be empty".into()));
        }
        Ok(match s {
            "doc" => NodeKind::Doc,
            "heading" => NodeKind::Heading,
            "paragraph" => NodeKind::Paragraph,
            "codeblock" => NodeKind::CodeBlock,
            other => NodeKind::Other(other.to_string()),
        })
    }
}

impl Serialize for NodeKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One block from the upstream tokenizer.
///
/// `start`/`end` are byte offsets into the document's raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: NodeKind,
    pub start: usize,
    pub end: usize,
    pub level: Option<u32>,
    pub title: Option<String>,
    pub language: Option<String>,
}

impl Block {
    pub fn heading(level: u32, title: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            kind: NodeKind::Heading,
            start,
            end,
            level: Some(level),
            title: Some(title.into()),
            language: None,
        }
    }

    pub fn paragraph(start: usize, end: usize) -> Self {
        Self {
            kind: NodeKind::Paragraph,
            start,
            end,
            level: None,
            title: None,
            language: None,
        }
    }

    pub fn code_block(language: Option<&str>, start: usize, end: usize) -> Self {
        Self {
            kind: NodeKind::CodeBlock,
            start,
            end,
            level: None,
            title: None,
            language: language.map(str::to_string),
        }
    }
}

/// A persisted graph node.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub pk: i64,
    pub short_id: String,
    pub full_id: String,
    pub document_id: String,
    pub kind: NodeKind,
    pub level: Option<u32>,
    pub title: Option<String>,
    pub start: i64,
    pub end: i64,
    pub parent_pk: Option<i64>,
    pub metadata: Metadata,
}

/// Node about to be inserted; ids already allocated.
#[derive(Debug, Clone)]
pub struct NewNode {
    pub short_id: String,
    pub full_id: String,
    pub document_id: String,
    pub kind: NodeKind,
    pub level: Option<u32>,
    pub title: Option<String>,
    pub start: i64,
    pub end: i64,
    pub parent_pk: Option<i64>,
    pub metadata: Metadata,
}

/// A typed directed edge between two nodes.
#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub src_pk: i64,
    pub dst_pk: i64,
    pub edge_type: String,
    pub weight: f64,
    pub metadata: Metadata,
}

/// Everything created by one graph build.
#[derive(Debug, Clone, Serialize)]
pub struct BuiltGraph {
    pub outcome: RegisterOutcome,
    pub root: Node,
    /// All created nodes in creation order, root first.
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// A full-text search hit. Lower `score` is more relevant.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub node: Node,
    pub score: f64,
    pub snippet: String,
}

/// A stored embedding vector.
#[derive(Debug, Clone, Serialize)]
pub struct Embedding {
    pub id: i64,
    pub full_id: String,
    pub model: String,
    pub dims: usize,
    pub vector: Vec<f32>,
    pub created_at: i64,
}

/// Kind of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Project,
    KnowledgeBase,
    Workspace,
    Other(String),
}

impl CollectionKind {
    pub fn as_str(&self) -> &str {
        match self {
            CollectionKind::Project => "project",
            CollectionKind::KnowledgeBase => "knowledgebase",
            CollectionKind::Workspace => "workspace",
            CollectionKind::Other(s) => s,
        }
    }
}

impl FromStr for CollectionKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(StoreError::InvalidInput(
                "collection kind must not be empty".into(),
            ));
        }
        Ok(match s {
            "project" => CollectionKind::Project,
            "knowledgebase" => CollectionKind::KnowledgeBase,
            "workspace" => CollectionKind::Workspace,
            other => CollectionKind::Other(other.to_string()),
        })
    }
}

impl Serialize for CollectionKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What a collection member or topic link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Document,
    Node,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Document => "document",
            TargetType::Node => "node",
        }
    }
}

impl FromStr for TargetType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(TargetType::Document),
            "node" => Ok(TargetType::Node),
            other => Err(StoreError::Corrupt(format!("unknown target type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub id: String,
    pub kind: CollectionKind,
    pub name: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionMember {
    pub collection_id: String,
    pub member_type: TargetType,
    pub member_pk: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    pub id: String,
    pub name: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopicLink {
    pub topic_id: String,
    pub target_type: TargetType,
    pub target_pk: String,
    pub weight: f64,
    pub metadata: Metadata,
}

/// Per-project defaults, one row per project collection.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectSettings {
    pub collection_id: String,
    pub defaults: Metadata,
    pub updated_at: i64,
}

/// Row counts across the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub documents: i64,
    pub nodes: i64,
    pub edges: i64,
    pub fts_entries: i64,
    pub embeddings: i64,
    pub collections: i64,
    pub topics: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_roundtrip() {
        for kind in ["doc", "heading", "paragraph", "codeblock", "table"] {
            assert_eq!(kind.parse::<NodeKind>().unwrap().as_str(), kind);
        }
        assert_eq!(
            "list".parse::<NodeKind>().unwrap(),
            NodeKind::Other("list".to_string())
        );
        assert!("".parse::<NodeKind>().is_err());
    }

    #[test]
    fn test_target_type_parse() {
        assert_eq!("node".parse::<TargetType>().unwrap(), TargetType::Node);
        assert!("edge".parse::<TargetType>().is_err());
    }
}
