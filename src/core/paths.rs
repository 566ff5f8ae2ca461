//! core::paths
//!
//! Centralized path routing for memvault's own storage.
//!
//! # Storage Layout
//!
//! Nodes live in the working tree under `root`. Service state lives inside
//! the git directory so it is never committed and never addressable as a
//! node:
//! - `<git_dir>/memvault/lock` - Exclusive owner lock
//! - `<git_dir>/memvault/txn/<id>.json` - Staging journals
//! - `<git_dir>/memvault/txn/<id>.pre/` - Pre-images of staged paths
//!
//! # Example
//!
//! ```
//! use memvault::core::paths::StorePaths;
//! use std::path::PathBuf;
//!
//! let paths = StorePaths::new(PathBuf::from("/srv/memory"), PathBuf::from("/srv/memory/.git"));
//! assert_eq!(paths.lock_path(), PathBuf::from("/srv/memory/.git/memvault/lock"));
//! ```

use std::path::{Path, PathBuf};

/// Centralized path routing for service storage.
///
/// No code outside this module should compute `*.join("memvault")` paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    /// Working tree root holding the nodes.
    pub root: PathBuf,
    /// The repository's git directory.
    pub git_dir: PathBuf,
}

impl StorePaths {
    pub fn new(root: PathBuf, git_dir: PathBuf) -> Self {
        Self { root, git_dir }
    }

    /// Working tree root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<git_dir>/memvault`
    pub fn state_dir(&self) -> PathBuf {
        self.git_dir.join("memvault")
    }

    /// `<git_dir>/memvault/lock`
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    /// `<git_dir>/memvault/txn`
    pub fn txn_dir(&self) -> PathBuf {
        self.state_dir().join("txn")
    }

    /// `<git_dir>/memvault/txn/<id>.json`
    pub fn txn_path(&self, txn_id: &str) -> PathBuf {
        self.txn_dir().join(format!("{}.json", txn_id))
    }

    /// `<git_dir>/memvault/txn/<id>.pre`
    pub fn pre_image_dir(&self, txn_id: &str) -> PathBuf {
        self.txn_dir().join(format!("{}.pre", txn_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> StorePaths {
        StorePaths::new(PathBuf::from("/m"), PathBuf::from("/m/.git"))
    }

    #[test]
    fn state_lives_in_git_dir() {
        assert_eq!(paths().state_dir(), PathBuf::from("/m/.git/memvault"));
        assert!(paths().txn_dir().starts_with(&paths().git_dir));
    }

    #[test]
    fn pre_images_sit_beside_journal() {
        assert_eq!(
            paths().pre_image_dir("abc"),
            PathBuf::from("/m/.git/memvault/txn/abc.pre")
        );
    }

    #[test]
    fn txn_path_uses_id() {
        assert_eq!(
            paths().txn_path("abc"),
            PathBuf::from("/m/.git/memvault/txn/abc.json")
        );
    }
}
