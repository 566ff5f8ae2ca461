//! error
//!
//! The caller-facing error taxonomy.
//!
//! Every module has its own error enum. [`MemoryError`] is what the service
//! facade returns; each module error converts into it so the engine can use
//! `?` throughout.
//!
//! # Retriable errors
//!
//! `Busy` and `Conflict` are the only errors a caller should retry: the first
//! after a short wait, the second after re-reading the node to get its
//! current version.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::node_path::PathError;
use crate::core::ops::{JournalError, LockError};
use crate::core::types::Version;
use crate::git::{GitError, PushError};
use crate::store::ContentError;

/// Errors returned by the memory service.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("invalid path '{path}': {source}")]
    InvalidPath { path: String, source: PathError },

    #[error("content too large ({size} bytes, max {max})")]
    ContentTooLarge { size: usize, max: usize },

    #[error("content cannot be empty or whitespace-only")]
    EmptyContent,

    #[error("node not found: {0}")]
    NotFound(String),

    #[error("version conflict on '{path}': expected {expected}, current {}", display_version(.actual))]
    Conflict {
        path: String,
        expected: Version,
        /// Current version; `None` when the node does not exist.
        actual: Option<Version>,
    },

    #[error("store is read-only")]
    ReadOnly,

    #[error("store is busy; write gate not acquired within {0:?}")]
    Busy(Duration),

    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    #[error("commit failed: {0}")]
    CommitFailure(String),

    #[error("push failed: {0}")]
    PushFailure(#[source] PushError),

    #[error("remote mismatch: configured '{configured}', repository has '{actual}'")]
    RepositoryMismatch { configured: String, actual: String },

    #[error("startup failed: {0}")]
    Startup(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn display_version(version: &Option<Version>) -> String {
    match version {
        Some(v) => v.to_string(),
        None => "none (node does not exist)".into(),
    }
}

impl MemoryError {
    pub fn invalid_path(raw: &str, source: PathError) -> Self {
        MemoryError::InvalidPath {
            path: raw.to_string(),
            source,
        }
    }

    /// Whether retrying the same request can succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(self, MemoryError::Busy(_) | MemoryError::Conflict { .. })
    }

    /// Stable machine-readable code, used in CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            MemoryError::InvalidPath { .. } => "invalid_path",
            MemoryError::ContentTooLarge { .. } => "content_too_large",
            MemoryError::EmptyContent => "empty_content",
            MemoryError::NotFound(_) => "not_found",
            MemoryError::Conflict { .. } => "conflict",
            MemoryError::ReadOnly => "read_only",
            MemoryError::Busy(_) => "busy",
            MemoryError::InvalidBatch(_) => "invalid_batch",
            MemoryError::CommitFailure(_) => "commit_failure",
            MemoryError::PushFailure(_) => "push_failure",
            MemoryError::RepositoryMismatch { .. } => "repository_mismatch",
            MemoryError::Startup(_) => "startup",
            MemoryError::Repository(_) => "repository",
            MemoryError::Io { .. } => "io",
        }
    }
}

impl From<ContentError> for MemoryError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(path) => MemoryError::NotFound(path.to_string()),
            ContentError::TooLarge { size, max } => MemoryError::ContentTooLarge { size, max },
            ContentError::Empty => MemoryError::EmptyContent,
            ContentError::InvalidUtf8(path) => MemoryError::Io {
                path: PathBuf::from(path.as_str()),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "node is not valid UTF-8",
                ),
            },
            ContentError::Io { path, source } => MemoryError::Io { path, source },
        }
    }
}

impl From<GitError> for MemoryError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::RepositoryMismatch { configured, actual } => {
                MemoryError::RepositoryMismatch { configured, actual }
            }
            GitError::NotARepository { .. }
            | GitError::BareRepository { .. }
            | GitError::WrongBranch { .. }
            | GitError::Clone(_) => MemoryError::Startup(err.to_string()),
            GitError::CommitFailed(message) => MemoryError::CommitFailure(message),
            GitError::Io { path, source } => MemoryError::Io { path, source },
            GitError::Git { .. } => MemoryError::Repository(err.to_string()),
        }
    }
}

impl From<PushError> for MemoryError {
    fn from(err: PushError) -> Self {
        MemoryError::PushFailure(err)
    }
}

impl From<JournalError> for MemoryError {
    fn from(err: JournalError) -> Self {
        let source = match err {
            JournalError::Io(source) => source,
            other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
        };
        MemoryError::Io {
            path: PathBuf::from("<staging journal>"),
            source,
        }
    }
}

impl From<LockError> for MemoryError {
    fn from(err: LockError) -> Self {
        MemoryError::Startup(err.to_string())
    }
}

impl From<ConfigError> for MemoryError {
    fn from(err: ConfigError) -> Self {
        MemoryError::Startup(err.to_string())
    }
}
