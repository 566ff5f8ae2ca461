//! core::ops::journal
//!
//! Staging journal for crash safety of write transactions.
//!
//! # Crash Safety Contract
//!
//! 1. **Write-ahead:** a path is appended to the journal, with fsync, before
//!    the working tree is touched for it. A crash at any point leaves a
//!    journal that names every path that might be dirty.
//!
//! 2. **Pre-images:** alongside each path the journal records what the path
//!    held before staging, either absent or a saved copy of its bytes. The
//!    copy is fsynced before the journal names it.
//!
//! 3. **Recoverability:** after a crash, [`StagingJournal::list_pending`]
//!    returns every transaction that never reached a terminal phase. If HEAD
//!    still equals the journal's `base`, the listed paths are restored from
//!    their pre-images, or from the HEAD tree for paths without one. If HEAD
//!    moved, the commit landed and only the journal file is left to clean up.
//!
//! 4. **Short-lived:** journals are deleted once the transaction commits or
//!    rolls back. Steady state is an empty `txn/` directory.
//!
//! # Storage
//!
//! - `<git_dir>/memvault/txn/<txn_id>.json`
//! - `<git_dir>/memvault/txn/<txn_id>.pre/<n>` for saved pre-images
//!
//! # Example
//!
//! ```ignore
//! use memvault::core::ops::journal::StagingJournal;
//!
//! let mut journal = StagingJournal::begin(&paths, "update notes", head)?;
//! journal.append_with_prior(&paths, &node_path, current.as_deref())?;
//! // ... stage the file, commit ...
//! journal.finish(&paths)?;
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::node_path::NodePath;
use crate::core::paths::StorePaths;
use crate::core::types::Version;

/// Errors from journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("journal not found: {0}")]
    NotFound(String),
}

/// Unique identifier for a write transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxnId(String);

impl TxnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an id read back from a journal file name.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TxnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TxnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of a write transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxnPhase {
    /// Files are being staged; the working tree may differ from HEAD.
    Staging,
    /// The commit was created.
    Committed,
    /// Staged paths were restored from HEAD.
    RolledBack,
}

impl TxnPhase {
    pub fn is_finished(&self) -> bool {
        matches!(self, TxnPhase::Committed | TxnPhase::RolledBack)
    }
}

/// What a staged path held before the transaction touched it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorImage {
    pub path: NodePath,
    /// File name of the saved copy under the pre-image directory; `None`
    /// when the path did not exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved: Option<String>,
}

/// Pre-transaction content of a path, loaded back from the journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriorContent {
    Absent,
    Bytes(Vec<u8>),
}

/// Persisted record of one write transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingJournal {
    pub txn_id: TxnId,
    pub message: String,
    /// HEAD when the transaction started; `None` on an unborn branch.
    pub base: Option<Version>,
    pub phase: TxnPhase,
    /// Paths that may have been touched, in staging order.
    pub paths: Vec<NodePath>,
    /// Pre-images for the entries of `paths`. Journals written by
    /// [`append_path`](Self::append_path) have none.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub priors: Vec<PriorImage>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<Version>,
}

impl StagingJournal {
    /// Open a new journal and persist it before any path is staged.
    pub fn begin(
        paths: &StorePaths,
        message: impl Into<String>,
        base: Option<Version>,
    ) -> Result<Self, JournalError> {
        let journal = Self {
            txn_id: TxnId::new(),
            message: message.into(),
            base,
            phase: TxnPhase::Staging,
            paths: Vec::new(),
            priors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            commit: None,
        };
        journal.write(paths)?;
        Ok(journal)
    }

    /// Record that `path` is about to be staged. Persists with fsync.
    pub fn append_path(&mut self, paths: &StorePaths, path: &NodePath) -> Result<(), JournalError> {
        if !self.paths.contains(path) {
            self.paths.push(path.clone());
        }
        self.write(paths)
    }

    /// Record that `path` is about to be staged along with its current
    /// content, `None` when the file does not exist. The saved copy is
    /// fsynced before the journal is rewritten.
    pub fn append_with_prior(
        &mut self,
        paths: &StorePaths,
        path: &NodePath,
        prior: Option<&[u8]>,
    ) -> Result<(), JournalError> {
        if self.paths.contains(path) {
            return Ok(());
        }
        let saved = match prior {
            Some(bytes) => {
                let name = self.priors.len().to_string();
                let dir = paths.pre_image_dir(self.txn_id.as_str());
                fs::create_dir_all(&dir)?;
                write_synced(&dir.join(&name), bytes)?;
                Some(name)
            }
            None => None,
        };
        self.priors.push(PriorImage {
            path: path.clone(),
            saved,
        });
        self.paths.push(path.clone());
        self.write(paths)
    }

    /// Pre-transaction content of `path`, or `None` if the journal holds no
    /// pre-image for it.
    pub fn prior_content(
        &self,
        paths: &StorePaths,
        path: &NodePath,
    ) -> Result<Option<PriorContent>, JournalError> {
        let Some(image) = self.priors.iter().find(|p| &p.path == path) else {
            return Ok(None);
        };
        match &image.saved {
            Some(name) => {
                let file = paths.pre_image_dir(self.txn_id.as_str()).join(name);
                Ok(Some(PriorContent::Bytes(fs::read(file)?)))
            }
            None => Ok(Some(PriorContent::Absent)),
        }
    }

    /// Mark the transaction committed. Persists with fsync.
    pub fn mark_committed(
        &mut self,
        paths: &StorePaths,
        commit: Option<Version>,
    ) -> Result<(), JournalError> {
        self.phase = TxnPhase::Committed;
        self.commit = commit;
        self.finished_at = Some(Utc::now());
        self.write(paths)
    }

    /// Mark the transaction rolled back. Persists with fsync.
    pub fn mark_rolled_back(&mut self, paths: &StorePaths) -> Result<(), JournalError> {
        self.phase = TxnPhase::RolledBack;
        self.finished_at = Some(Utc::now());
        self.write(paths)
    }

    /// Remove the journal file, then its pre-images. Called once the
    /// transaction is terminal.
    pub fn finish(&self, paths: &StorePaths) -> Result<(), JournalError> {
        match fs::remove_file(paths.txn_path(self.txn_id.as_str())) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        match fs::remove_dir_all(paths.pre_image_dir(self.txn_id.as_str())) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the journal to disk with fsync.
    ///
    /// When compiled with `cfg(test)` or the `fault_injection` feature,
    /// [`fault_injection::set_crash_after`] can make this fail on demand.
    pub fn write(&self, paths: &StorePaths) -> Result<(), JournalError> {
        #[cfg(any(test, feature = "fault_injection"))]
        if fault_injection::should_crash() {
            return Err(JournalError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "injected journal write failure",
            )));
        }

        fs::create_dir_all(paths.txn_dir())?;
        let content = serde_json::to_string_pretty(self)?;
        write_synced(&paths.txn_path(self.txn_id.as_str()), content.as_bytes())
    }

    pub fn read(paths: &StorePaths, txn_id: &TxnId) -> Result<Self, JournalError> {
        let path = paths.txn_path(txn_id.as_str());
        if !path.exists() {
            return Err(JournalError::NotFound(txn_id.to_string()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// All journals on disk, oldest first.
    pub fn list(paths: &StorePaths) -> Result<Vec<Self>, JournalError> {
        let dir = paths.txn_dir();
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut journals = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_suffix(".json"))
                .map(TxnId::from_string)
            else {
                continue;
            };
            journals.push(Self::read(paths, &id)?);
        }
        journals.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(journals)
    }

    /// Journals whose transaction never reached a terminal phase.
    pub fn list_pending(paths: &StorePaths) -> Result<Vec<Self>, JournalError> {
        Ok(Self::list(paths)?
            .into_iter()
            .filter(|j| !j.phase.is_finished())
            .collect())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), JournalError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Fault injection for testing crash recovery.
///
/// ```ignore
/// use memvault::core::ops::journal::fault_injection;
///
/// fault_injection::set_crash_after(2);
/// // begin() succeeds, the first append_path() fails
/// fault_injection::reset();
/// ```
#[cfg(any(test, feature = "fault_injection"))]
pub mod fault_injection {
    use std::cell::Cell;

    thread_local! {
        /// Writes left before the failing one; `None` when disarmed.
        static REMAINING: Cell<Option<usize>> = const { Cell::new(None) };
    }

    /// Make the `n`th journal write on this thread fail. `0` disarms.
    pub fn set_crash_after(n: usize) {
        REMAINING.with(|r| r.set(n.checked_sub(1)));
    }

    /// Consume one write. `true` once the armed write is reached; every
    /// later write fails too until [`reset`].
    pub fn should_crash() -> bool {
        REMAINING.with(|r| match r.get() {
            None => false,
            Some(0) => true,
            Some(left) => {
                r.set(Some(left - 1));
                false
            }
        })
    }

    pub fn reset() {
        REMAINING.with(|r| r.set(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node_path::PathValidator;
    use tempfile::TempDir;

    fn test_paths(temp: &TempDir) -> StorePaths {
        StorePaths::new(temp.path().to_path_buf(), temp.path().join(".git"))
    }

    fn node(raw: &str) -> NodePath {
        PathValidator::default().sanitize(raw).unwrap()
    }

    mod txn_id {
        use super::*;

        #[test]
        fn new_generates_unique_ids() {
            assert_ne!(TxnId::new(), TxnId::new());
        }

        #[test]
        fn display_matches_as_str() {
            let id = TxnId::from_string("abc");
            assert_eq!(id.to_string(), "abc");
            assert_eq!(id.as_str(), "abc");
        }
    }

    mod persistence {
        use super::*;

        #[test]
        fn begin_writes_file() {
            let temp = TempDir::new().unwrap();
            let paths = test_paths(&temp);

            let journal = StagingJournal::begin(&paths, "msg", None).unwrap();
            assert!(paths.txn_path(journal.txn_id.as_str()).exists());
            assert_eq!(journal.phase, TxnPhase::Staging);
        }

        #[test]
        fn append_path_is_persisted_and_deduplicated() {
            let temp = TempDir::new().unwrap();
            let paths = test_paths(&temp);

            let mut journal = StagingJournal::begin(&paths, "msg", None).unwrap();
            journal.append_path(&paths, &node("a")).unwrap();
            journal.append_path(&paths, &node("b/c")).unwrap();
            journal.append_path(&paths, &node("a")).unwrap();

            let read = StagingJournal::read(&paths, &journal.txn_id).unwrap();
            assert_eq!(read.paths, vec![node("a"), node("b/c")]);
            assert_eq!(read.message, "msg");
        }

        #[test]
        fn pre_images_round_trip_and_are_removed() {
            let temp = TempDir::new().unwrap();
            let paths = test_paths(&temp);

            let mut journal = StagingJournal::begin(&paths, "msg", None).unwrap();
            journal
                .append_with_prior(&paths, &node("had"), Some(b"before".as_slice()))
                .unwrap();
            journal.append_with_prior(&paths, &node("new"), None).unwrap();
            journal
                .append_with_prior(&paths, &node("had"), Some(b"ignored".as_slice()))
                .unwrap();

            let read = StagingJournal::read(&paths, &journal.txn_id).unwrap();
            assert_eq!(read.paths, vec![node("had"), node("new")]);
            assert_eq!(
                read.prior_content(&paths, &node("had")).unwrap(),
                Some(PriorContent::Bytes(b"before".to_vec()))
            );
            assert_eq!(
                read.prior_content(&paths, &node("new")).unwrap(),
                Some(PriorContent::Absent)
            );
            assert_eq!(read.prior_content(&paths, &node("other")).unwrap(), None);

            journal.finish(&paths).unwrap();
            assert!(!paths.pre_image_dir(journal.txn_id.as_str()).exists());
        }

        #[test]
        fn journal_without_priors_still_parses() {
            let temp = TempDir::new().unwrap();
            let paths = test_paths(&temp);
            fs::create_dir_all(paths.txn_dir()).unwrap();
            fs::write(
                paths.txn_path("old"),
                r#"{"txn_id":"old","message":"m","base":null,"phase":"staging","paths":["a.md"],"started_at":"2024-01-01T00:00:00Z"}"#,
            )
            .unwrap();

            let journal = StagingJournal::read(&paths, &TxnId::from_string("old")).unwrap();
            assert_eq!(journal.paths, vec![node("a")]);
            assert!(journal.priors.is_empty());
            assert_eq!(journal.prior_content(&paths, &node("a")).unwrap(), None);
        }

        #[test]
        fn read_missing_is_not_found() {
            let temp = TempDir::new().unwrap();
            let paths = test_paths(&temp);
            let result = StagingJournal::read(&paths, &TxnId::from_string("nope"));
            assert!(matches!(result, Err(JournalError::NotFound(_))));
        }

        #[test]
        fn finish_removes_file_and_is_idempotent() {
            let temp = TempDir::new().unwrap();
            let paths = test_paths(&temp);

            let journal = StagingJournal::begin(&paths, "msg", None).unwrap();
            journal.finish(&paths).unwrap();
            assert!(!paths.txn_path(journal.txn_id.as_str()).exists());
            journal.finish(&paths).unwrap();
        }
    }

    mod pending {
        use super::*;

        #[test]
        fn empty_when_no_dir() {
            let temp = TempDir::new().unwrap();
            assert!(StagingJournal::list_pending(&test_paths(&temp))
                .unwrap()
                .is_empty());
        }

        #[test]
        fn excludes_terminal_phases() {
            let temp = TempDir::new().unwrap();
            let paths = test_paths(&temp);

            let staging = StagingJournal::begin(&paths, "one", None).unwrap();
            let mut committed = StagingJournal::begin(&paths, "two", None).unwrap();
            committed.mark_committed(&paths, None).unwrap();
            let mut rolled = StagingJournal::begin(&paths, "three", None).unwrap();
            rolled.mark_rolled_back(&paths).unwrap();

            let pending = StagingJournal::list_pending(&paths).unwrap();
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].txn_id, staging.txn_id);
            assert_eq!(StagingJournal::list(&paths).unwrap().len(), 3);
        }
    }

    mod faults {
        use super::*;

        #[test]
        fn crash_after_second_write() {
            let temp = TempDir::new().unwrap();
            let paths = test_paths(&temp);

            fault_injection::set_crash_after(2);
            let mut journal = StagingJournal::begin(&paths, "msg", None).unwrap();
            let result = journal.append_path(&paths, &node("a"));
            fault_injection::reset();

            assert!(matches!(result, Err(JournalError::Io(_))));
            let read = StagingJournal::read(&paths, &journal.txn_id).unwrap();
            assert!(read.paths.is_empty());
        }
    }
}
