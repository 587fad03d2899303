//! Hierarchical key-value store contracts and record adapter.
//!
//! # Responsibility
//! - Define the async `NodeStore` contract of the hosted namespaced store.
//! - Map record IDs onto `namespace/recordId` node paths.
//! - Ship an in-memory store and a local SQLite-backed store.
//!
//! # Invariants
//! - Node names only contain ASCII letters, digits, `_` and `-`.
//! - Store failures propagate unchanged; nothing here retries.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub mod memory;
pub mod record_store;
pub mod sqlite;

static NODE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid node name regex"));

/// Returns whether `value` can be used as one node path segment.
pub fn is_valid_node_name(value: &str) -> bool {
    NODE_NAME_RE.is_match(value)
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Address of one node in the hierarchical store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    /// Returns the implicit root node.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a `/`-separated path, validating every segment.
    pub fn parse(value: &str) -> StoreResult<Self> {
        let mut path = Self::root();
        for segment in value.split('/').filter(|segment| !segment.is_empty()) {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    /// Returns the path of child `name` under this node.
    pub fn child(&self, name: &str) -> StoreResult<Self> {
        if !is_valid_node_name(name) {
            return Err(StoreError::InvalidNodeName(name.to_string()));
        }
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Ok(Self { segments })
    }

    pub fn parent(&self) -> Option<Self> {
        let (_, head) = self.segments.split_last()?;
        Some(Self {
            segments: head.to_vec(),
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

/// Store-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Node name is not a valid path segment.
    InvalidNodeName(String),
    /// Node was never created, or holds no value.
    NotFound(NodePath),
    /// Record could not be serialized.
    Encode(String),
    /// Stored value could not be decoded into a record.
    Corrupt { path: NodePath, message: String },
    /// Underlying store I/O failure.
    Backend { path: NodePath, message: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNodeName(name) => write!(f, "invalid node name: `{name}`"),
            Self::NotFound(path) => write!(f, "node not found: {path}"),
            Self::Encode(message) => write!(f, "failed to encode record: {message}"),
            Self::Corrupt { path, message } => {
                write!(f, "corrupt value at {path}: {message}")
            }
            Self::Backend { path, message } => write!(f, "store failure at {path}: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Async contract of the hosted hierarchical key-value store.
///
/// Every call is a potential suspension point for the caller.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Creates-or-returns child `name` under `parent`.
    async fn make_child_node(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath>;
    /// Replaces the value held by `node`.
    async fn set_value(&self, node: &NodePath, value: String) -> StoreResult<()>;
    /// Returns the value held by `node`, or `None` when empty.
    async fn get_value(&self, node: &NodePath) -> StoreResult<Option<String>>;
    /// Returns the names of nodes created directly under `parent`, ascending.
    async fn child_names(&self, parent: &NodePath) -> StoreResult<Vec<String>>;
}

#[async_trait]
impl<S: NodeStore + ?Sized> NodeStore for Arc<S> {
    async fn make_child_node(&self, parent: &NodePath, name: &str) -> StoreResult<NodePath> {
        (**self).make_child_node(parent, name).await
    }

    async fn set_value(&self, node: &NodePath, value: String) -> StoreResult<()> {
        (**self).set_value(node, value).await
    }

    async fn get_value(&self, node: &NodePath) -> StoreResult<Option<String>> {
        (**self).get_value(node).await
    }

    async fn child_names(&self, parent: &NodePath) -> StoreResult<Vec<String>> {
        (**self).child_names(parent).await
    }
}

#[cfg(test)]
mod tests {
    use super::{is_valid_node_name, NodePath, StoreError};

    #[test]
    fn node_names_reject_separators_and_spaces() {
        assert!(is_valid_node_name("P12345"));
        assert!(is_valid_node_name("cert_2024-01"));
        assert!(!is_valid_node_name(""));
        assert!(!is_valid_node_name("a/b"));
        assert!(!is_valid_node_name("with space"));
        assert!(!is_valid_node_name(".."));
    }

    #[test]
    fn parse_and_display_roundtrip() {
        let path = NodePath::parse("edCert/certificates/C-1").expect("valid path");
        assert_eq!(path.to_string(), "edCert/certificates/C-1");
        assert_eq!(path.name(), Some("C-1"));
        assert_eq!(
            path.parent().expect("has parent").to_string(),
            "edCert/certificates"
        );
    }

    #[test]
    fn child_rejects_invalid_segment() {
        let err = NodePath::root()
            .child("bad name")
            .expect_err("space is not allowed");
        assert_eq!(err, StoreError::InvalidNodeName("bad name".to_string()));
    }
}
