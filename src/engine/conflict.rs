//! engine::conflict
//!
//! Optimistic concurrency checks.
//!
//! A caller that read a node at version `v` may pass `v` back as the
//! expected version of a mutation. The mutation proceeds only if the node is
//! still at `v`. Without an expectation the mutation is unconditional and
//! the last writer wins.
//!
//! All checks of one transaction run against a single [`VersionSnapshot`]
//! captured after the write gate was entered, so a batch sees one
//! consistent view of the store.

use std::collections::HashMap;

use crate::core::node_path::NodePath;
use crate::core::types::Version;
use crate::error::MemoryError;
use crate::git::{GitError, GitManager};

/// Versions of a set of paths as of one HEAD.
#[derive(Debug, Clone, Default)]
pub struct VersionSnapshot {
    head: Option<Version>,
    versions: HashMap<NodePath, Option<Version>>,
}

impl VersionSnapshot {
    /// Capture HEAD and the current version of each path.
    pub fn capture<'a>(
        git: &GitManager,
        paths: impl IntoIterator<Item = &'a NodePath>,
    ) -> Result<Self, GitError> {
        let head = git.current_head_version();
        let mut versions = HashMap::new();
        for path in paths {
            versions.insert(path.clone(), git.path_version(path)?);
        }
        Ok(Self { head, versions })
    }

    pub fn head(&self) -> Option<&Version> {
        self.head.as_ref()
    }

    /// Version of `path`, `None` if it was not committed at capture time.
    pub fn version_of(&self, path: &NodePath) -> Option<&Version> {
        self.versions.get(path).and_then(Option::as_ref)
    }
}

/// Compares expected versions against a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ConflictDetector<'a> {
    snapshot: &'a VersionSnapshot,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(snapshot: &'a VersionSnapshot) -> Self {
        Self { snapshot }
    }

    /// Fail with `Conflict` if `expected` is set and differs from the
    /// snapshot. A missing node never matches an expectation.
    pub fn check(&self, path: &NodePath, expected: Option<&Version>) -> Result<(), MemoryError> {
        let Some(expected) = expected else {
            return Ok(());
        };
        let actual = self.snapshot.version_of(path);
        if actual == Some(expected) {
            return Ok(());
        }
        Err(MemoryError::Conflict {
            path: path.to_string(),
            expected: expected.clone(),
            actual: actual.cloned(),
        })
    }
}
