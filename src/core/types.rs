//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Version`] - Git commit identifier used as an optimistic-concurrency token
//! - [`MemoryNode`] - A markdown node with content and metadata
//! - [`NodeMetadata`] - Size, timestamps, and version of a node
//! - [`BatchOperation`] - One create/update/delete inside a batch
//! - [`BatchOutcome`] - Per-operation result of an applied batch
//! - [`CommitInfo`] - A commit in the store's linear history
//!
//! # Validation
//!
//! Versions are validated at construction time. Node paths are validated by
//! [`crate::core::node_path::PathValidator`] and can only be obtained from it.
//!
//! # Examples
//!
//! ```
//! use memvault::core::types::Version;
//!
//! let version = Version::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
//! assert_eq!(version.as_str(), "abc123def4567890abc123def4567890abc12345");
//! assert!(Version::new("not-a-sha").is_err());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::node_path::NodePath;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid version: {0}")]
    InvalidVersion(String),
}

/// A commit identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// The version of a node is the commit that last changed its content, so two
/// reads return the same version exactly when the content is the same.
///
/// # Example
///
/// ```
/// use memvault::core::types::Version;
///
/// let version = Version::new("abc123def4567890abc123def4567890abc12345").unwrap();
/// assert_eq!(version.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    /// Create a new validated version.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersion` if the string is not a 40 or 64
    /// character hex identifier.
    pub fn new(version: impl Into<String>) -> Result<Self, TypeError> {
        let version = version.into().to_ascii_lowercase();
        Self::validate(&version)?;
        Ok(Self(version))
    }

    /// Build a version from a git2 object id.
    pub(crate) fn from_oid(oid: git2::Oid) -> Self {
        Self(oid.to_string())
    }

    /// Convert back into a git2 object id.
    pub(crate) fn to_oid(&self) -> Option<git2::Oid> {
        git2::Oid::from_str(&self.0).ok()
    }

    /// Get an abbreviated form of the version.
    ///
    /// Returns the first `len` characters, or the whole version if shorter.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    fn validate(version: &str) -> Result<(), TypeError> {
        if version.len() != 40 && version.len() != 64 {
            return Err(TypeError::InvalidVersion(format!(
                "expected 40 or 64 hex characters, got {}",
                version.len()
            )));
        }
        if !version.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidVersion(
                "version must be hexadecimal".into(),
            ));
        }
        Ok(())
    }

    /// Get the version as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Version {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.0
    }
}

impl AsRef<str> for Version {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata for a memory node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// Creation time reported by the filesystem (falls back to mtime).
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Content size in bytes.
    pub size: u64,
    /// Commit that last changed this node, `None` if never committed.
    pub version: Option<Version>,
}

/// A memory node: one markdown document keyed by its normalized path.
///
/// Nodes are not stored as objects. They are derived on each read from the
/// working tree and the repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub path: NodePath,
    pub content: String,
    pub metadata: NodeMetadata,
}

impl MemoryNode {
    const PREVIEW_CHARS: usize = 200;

    /// Number of lines in the content.
    pub fn line_count(&self) -> usize {
        self.content.lines().count()
    }

    /// The first 200 characters of content, `...`-terminated when cut.
    pub fn preview(&self) -> String {
        if self.content.chars().count() <= Self::PREVIEW_CHARS {
            return self.content.clone();
        }
        let head: String = self.content.chars().take(Self::PREVIEW_CHARS - 3).collect();
        format!("{head}...")
    }

    /// Whether the content is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }

    /// The node's version, if it has been committed.
    pub fn version(&self) -> Option<&Version> {
        self.metadata.version.as_ref()
    }
}

/// Acknowledgement of a deleted node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteAck {
    pub path: NodePath,
    /// The commit that removed the node. When nothing was committed this is
    /// the node's previous version, if it had one.
    pub version: Option<Version>,
}

/// Kind of a batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    /// Write a node, creating it if needed.
    Create,
    /// Overwrite an existing node. Fails with `NotFound` if it is missing.
    Update,
    /// Remove an existing node. Fails with `NotFound` if it is missing.
    Delete,
}

impl BatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchAction::Create => "create",
            BatchAction::Update => "update",
            BatchAction::Delete => "delete",
        }
    }

    /// Whether this action requires content.
    pub fn needs_content(&self) -> bool {
        !matches!(self, BatchAction::Delete)
    }
}

impl std::fmt::Display for BatchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One operation of a batch, as submitted by a caller.
///
/// The path is raw caller input; it is sanitized when the batch is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperation {
    pub action: BatchAction,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<Version>,
}

impl BatchOperation {
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: BatchAction::Create,
            path: path.into(),
            content: Some(content.into()),
            expected_version: None,
        }
    }

    pub fn update(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: BatchAction::Update,
            path: path.into(),
            content: Some(content.into()),
            expected_version: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            action: BatchAction::Delete,
            path: path.into(),
            content: None,
            expected_version: None,
        }
    }

    /// Attach an optimistic-concurrency precondition.
    pub fn expecting(mut self, version: Version) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// A batch as read from a request body or a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub message: String,
    pub operations: Vec<BatchOperation>,
}

/// Result of one operation in an applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BatchOutcome {
    Written(MemoryNode),
    Deleted(DeleteAck),
}

impl BatchOutcome {
    pub fn path(&self) -> &NodePath {
        match self {
            BatchOutcome::Written(node) => &node.path,
            BatchOutcome::Deleted(ack) => &ack.path,
        }
    }

    pub fn version(&self) -> Option<&Version> {
        match self {
            BatchOutcome::Written(node) => node.metadata.version.as_ref(),
            BatchOutcome::Deleted(ack) => ack.version.as_ref(),
        }
    }
}

/// A commit in the store's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub version: Version,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub changed_paths: Vec<String>,
}

/// One page of a node listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeListing {
    pub prefix: String,
    pub recursive: bool,
    /// Total matching nodes before pagination.
    pub total: usize,
    pub offset: usize,
    pub limit: Option<usize>,
    pub nodes: Vec<ListedNode>,
    /// Subdirectories of the prefix that hold nodes, as `dir/`. Filled only
    /// for non-recursive listings and not paginated.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directories: Vec<String>,
}

/// An entry in a [`NodeListing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedNode {
    pub path: NodePath,
    pub metadata: NodeMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    mod version {
        use super::*;

        #[test]
        fn valid_sha1() {
            assert!(Version::new("abc123def4567890abc123def4567890abc12345").is_ok());
        }

        #[test]
        fn valid_sha256() {
            let sha256 = "abc123def4567890abc123def4567890abc123def4567890abc123def456789a";
            assert_eq!(sha256.len(), 64);
            assert!(Version::new(sha256).is_ok());
        }

        #[test]
        fn normalizes_to_lowercase() {
            let v = Version::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
            assert_eq!(v.as_str(), "abc123def4567890abc123def4567890abc12345");
        }

        #[test]
        fn wrong_length_rejected() {
            assert!(Version::new("abc123").is_err());
            assert!(Version::new("").is_err());
        }

        #[test]
        fn non_hex_rejected() {
            assert!(Version::new("zzz123def4567890abc123def4567890abc12345").is_err());
        }

        #[test]
        fn short_form() {
            let v = Version::new("abc123def4567890abc123def4567890abc12345").unwrap();
            assert_eq!(v.short(7), "abc123d");
            assert_eq!(v.short(100).len(), 40);
        }

        #[test]
        fn oid_roundtrip() {
            let v = Version::new("abc123def4567890abc123def4567890abc12345").unwrap();
            let oid = v.to_oid().unwrap();
            assert_eq!(Version::from_oid(oid), v);
        }

        #[test]
        fn invalid_json_rejected() {
            let parsed: Result<Version, _> = serde_json::from_str("\"nope\"");
            assert!(parsed.is_err());
        }
    }

    mod batch {
        use super::*;

        #[test]
        fn parses_request_json() {
            let json = r#"{
                "message": "import notes",
                "operations": [
                    {"action": "create", "path": "a.md", "content": "hello"},
                    {"action": "delete", "path": "b",
                     "expected_version": "abc123def4567890abc123def4567890abc12345"}
                ]
            }"#;
            let request: BatchRequest = serde_json::from_str(json).unwrap();
            assert_eq!(request.operations.len(), 2);
            assert_eq!(request.operations[0].action, BatchAction::Create);
            assert_eq!(request.operations[1].action, BatchAction::Delete);
            assert!(request.operations[1].expected_version.is_some());
        }

        #[test]
        fn unknown_action_rejected() {
            let json = r#"{"action": "rename", "path": "a.md"}"#;
            let parsed: Result<BatchOperation, _> = serde_json::from_str(json);
            assert!(parsed.is_err());
        }

        #[test]
        fn delete_needs_no_content() {
            assert!(!BatchAction::Delete.needs_content());
            assert!(BatchAction::Create.needs_content());
            assert!(BatchAction::Update.needs_content());
        }
    }

    mod node {
        use super::*;
        use crate::core::node_path::PathValidator;

        fn node(content: &str) -> MemoryNode {
            let now = Utc::now();
            MemoryNode {
                path: PathValidator::default().sanitize("notes/a").unwrap(),
                content: content.to_string(),
                metadata: NodeMetadata {
                    created_at: now,
                    updated_at: now,
                    size: content.len() as u64,
                    version: None,
                },
            }
        }

        #[test]
        fn short_content_preview_is_whole() {
            assert_eq!(node("hello").preview(), "hello");
        }

        #[test]
        fn long_content_preview_is_cut() {
            let long = "x".repeat(500);
            let preview = node(&long).preview();
            assert_eq!(preview.chars().count(), 200);
            assert!(preview.ends_with("..."));
        }

        #[test]
        fn line_count_and_blank() {
            assert_eq!(node("a\nb\nc").line_count(), 3);
            assert!(node("  \n\t").is_blank());
            assert!(!node("x").is_blank());
        }
    }
}
