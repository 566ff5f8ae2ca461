//! engine::rollback
//!
//! Restoring staged paths to their pre-transaction state.
//!
//! Used by:
//! - the write coordinator, when staging or the commit fails
//! - startup recovery, for transactions a crash left in the `staging` phase
//!
//! # Restore rule
//!
//! Each staged path gets back the pre-image its journal recorded: the saved
//! bytes, or removal (with empty parents pruned) when it did not exist. A
//! path with no pre-image, from a journal that predates them, falls back to
//! the HEAD blob, or removal when HEAD has none. Paths are independent: a
//! failure on one does not stop the others.
//!
//! # Recovery
//!
//! A journal still in `staging` whose base equals the current HEAD means the
//! commit never happened, so its paths are restored. If HEAD moved past the
//! base, the commit landed before the crash and the working tree already
//! matches HEAD; only the journal file is removed.

use tracing::{info, warn};

use crate::core::node_path::NodePath;
use crate::core::ops::{JournalError, PriorContent, StagingJournal, TxnPhase};
use crate::git::GitManager;
use crate::store::ContentStore;

/// Result of restoring a set of paths.
#[derive(Debug, Default)]
pub struct RollbackResult {
    /// Paths rewritten with their earlier content.
    pub restored: Vec<NodePath>,
    /// Paths removed because they did not exist before.
    pub removed: Vec<NodePath>,
    /// Paths that could not be restored, with the reason.
    pub failed: Vec<(NodePath, String)>,
}

impl RollbackResult {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_complete() {
            format!(
                "rolled back {} paths ({} restored, {} removed)",
                self.restored.len() + self.removed.len(),
                self.restored.len(),
                self.removed.len()
            )
        } else {
            format!(
                "partial rollback: {} paths restored, {} failed",
                self.restored.len() + self.removed.len(),
                self.failed.len()
            )
        }
    }
}

/// Put every path `journal` staged back to its state before the transaction.
pub fn rollback_journal(
    git: &GitManager,
    store: &ContentStore,
    journal: &StagingJournal,
) -> RollbackResult {
    let mut result = RollbackResult::default();

    for path in &journal.paths {
        let prior = match journal.prior_content(git.paths(), path) {
            Ok(Some(prior)) => Ok(prior),
            Ok(None) => head_content(git, path),
            Err(e) => Err(e.to_string()),
        };
        let outcome = prior.and_then(|prior| match prior {
            PriorContent::Bytes(bytes) => store
                .write_bytes(path, &bytes)
                .map(|_| true)
                .map_err(|e| e.to_string()),
            PriorContent::Absent => store
                .remove_if_exists(path)
                .map(|_| false)
                .map_err(|e| e.to_string()),
        });
        match outcome {
            Ok(true) => result.restored.push(path.clone()),
            Ok(false) => result.removed.push(path.clone()),
            Err(reason) => {
                warn!(path = %path, error = %reason, "failed to restore path");
                result.failed.push((path.clone(), reason));
            }
        }
    }

    result
}

fn head_content(git: &GitManager, path: &NodePath) -> Result<PriorContent, String> {
    match git.blob_at_head(path) {
        Ok(Some(bytes)) => Ok(PriorContent::Bytes(bytes)),
        Ok(None) => Ok(PriorContent::Absent),
        Err(e) => Err(e.to_string()),
    }
}

/// Outcome of startup recovery.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Transactions whose staged paths were restored.
    pub rolled_back: Vec<String>,
    /// Transactions that had committed; their journals were just removed.
    pub completed: Vec<String>,
    /// Paths that could not be restored.
    pub failed: Vec<(NodePath, String)>,
}

impl RecoveryReport {
    pub fn is_empty(&self) -> bool {
        self.rolled_back.is_empty() && self.completed.is_empty()
    }
}

/// Resolve every journal left on disk by a previous process.
///
/// Must run before the first mutation, while the owner lock is held.
pub fn recover_pending(git: &GitManager, store: &ContentStore) -> Result<RecoveryReport, JournalError> {
    let paths = git.paths();
    let head = git.current_head_version();
    let mut report = RecoveryReport::default();

    for mut journal in StagingJournal::list(paths)? {
        let id = journal.txn_id.to_string();

        if journal.phase == TxnPhase::Staging && journal.base == head {
            let result = rollback_journal(git, store, &journal);
            info!(
                txn = %id,
                message = %journal.message,
                summary = %result.summary(),
                "recovered interrupted transaction"
            );
            report.failed.extend(result.failed);
            if let Err(e) = journal.mark_rolled_back(paths) {
                warn!(txn = %id, error = %e, "could not mark journal rolled back");
            }
            report.rolled_back.push(id);
        } else {
            info!(txn = %id, phase = ?journal.phase, "clearing finished transaction journal");
            report.completed.push(id);
        }

        journal.finish(paths)?;
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AuthorConfig;
    use crate::core::node_path::PathValidator;
    use crate::git::{OpenOptions, RetryPolicy};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn setup(root: &Path) -> (GitManager, ContentStore) {
        let git = GitManager::open(
            OpenOptions {
                root: root.to_path_buf(),
                remote_url: None,
                branch: "main".into(),
                author: AuthorConfig::default(),
                read_only: false,
                retry: RetryPolicy::default(),
            },
            None,
        )
        .unwrap();
        let store = ContentStore::new(root, PathValidator::default(), 10_000_000);
        (git, store)
    }

    fn node(raw: &str) -> NodePath {
        PathValidator::default().sanitize(raw).unwrap()
    }

    /// A staging journal naming `staged` without pre-images.
    fn legacy_journal(git: &GitManager, staged: &[NodePath]) -> StagingJournal {
        let mut journal =
            StagingJournal::begin(git.paths(), "staged", git.current_head_version()).unwrap();
        for path in staged {
            journal.append_path(git.paths(), path).unwrap();
        }
        journal
    }

    mod restore {
        use super::*;

        #[test]
        fn legacy_journal_falls_back_to_head() {
            let temp = TempDir::new().unwrap();
            let (git, store) = setup(temp.path());
            let (a, b) = (node("a"), node("deep/b"));
            store.write(&a, "committed").unwrap();
            git.commit(&[a.clone()], "c1").unwrap();

            let journal = legacy_journal(&git, &[a.clone(), b.clone()]);
            store.write(&a, "scribble").unwrap();
            store.write(&b, "uncommitted").unwrap();
            let result = rollback_journal(&git, &store, &journal);

            assert!(result.is_complete());
            assert_eq!(result.restored, vec![a.clone()]);
            assert_eq!(result.removed, vec![b.clone()]);
            assert_eq!(fs::read_to_string(a.resolve(temp.path())).unwrap(), "committed");
            assert!(!temp.path().join("deep").exists());
        }

        #[test]
        fn restores_deleted_file() {
            let temp = TempDir::new().unwrap();
            let (git, store) = setup(temp.path());
            let a = node("x/a");
            store.write(&a, "keep me").unwrap();
            git.commit(&[a.clone()], "c1").unwrap();

            let journal = legacy_journal(&git, &[a.clone()]);
            store.delete(&a).unwrap();
            rollback_journal(&git, &store, &journal);
            assert_eq!(store.read(&a).unwrap().0, "keep me");
        }

        #[test]
        fn pre_image_wins_over_head() {
            let temp = TempDir::new().unwrap();
            let (git, store) = setup(temp.path());
            let (tracked, untracked, fresh) = (node("tracked"), node("manual"), node("new/c"));
            store.write(&tracked, "committed").unwrap();
            git.commit(&[tracked.clone()], "c1").unwrap();
            store.write(&tracked, "edited by hand").unwrap();
            store.write(&untracked, "never committed").unwrap();

            let mut journal =
                StagingJournal::begin(git.paths(), "staged", git.current_head_version()).unwrap();
            for path in [&tracked, &untracked, &fresh] {
                let prior = store.read_bytes(path).unwrap();
                journal
                    .append_with_prior(git.paths(), path, prior.as_deref())
                    .unwrap();
                store.write(path, "staged").unwrap();
            }
            let result = rollback_journal(&git, &store, &journal);

            assert!(result.is_complete());
            assert_eq!(result.restored, vec![tracked.clone(), untracked.clone()]);
            assert_eq!(result.removed, vec![fresh.clone()]);
            assert_eq!(store.read(&tracked).unwrap().0, "edited by hand");
            assert_eq!(store.read(&untracked).unwrap().0, "never committed");
            assert!(!temp.path().join("new").exists());
        }
    }

    mod recovery {
        use super::*;

        #[test]
        fn staging_journal_at_head_is_rolled_back() {
            let temp = TempDir::new().unwrap();
            let (git, store) = setup(temp.path());
            let a = node("a");
            store.write(&a, "v1").unwrap();
            git.commit(&[a.clone()], "c1").unwrap();

            let mut journal =
                StagingJournal::begin(git.paths(), "crashed", git.current_head_version()).unwrap();
            journal.append_path(git.paths(), &a).unwrap();
            store.write(&a, "half written").unwrap();

            let report = recover_pending(&git, &store).unwrap();
            assert_eq!(report.rolled_back, vec![journal.txn_id.to_string()]);
            assert!(report.failed.is_empty());
            assert_eq!(store.read(&a).unwrap().0, "v1");
            assert!(StagingJournal::list(git.paths()).unwrap().is_empty());
        }

        #[test]
        fn recovery_restores_untracked_pre_image() {
            let temp = TempDir::new().unwrap();
            let (git, store) = setup(temp.path());
            let (seed, manual) = (node("seed"), node("manual"));
            store.write(&seed, "v1").unwrap();
            git.commit(&[seed.clone()], "c1").unwrap();
            store.write(&manual, "by hand").unwrap();

            let mut journal =
                StagingJournal::begin(git.paths(), "crashed", git.current_head_version()).unwrap();
            journal
                .append_with_prior(git.paths(), &manual, Some(b"by hand".as_slice()))
                .unwrap();
            store.write(&manual, "half written").unwrap();

            let report = recover_pending(&git, &store).unwrap();
            assert_eq!(report.rolled_back.len(), 1);
            assert_eq!(store.read(&manual).unwrap().0, "by hand");
            assert!(!git.paths().pre_image_dir(journal.txn_id.as_str()).exists());
        }

        #[test]
        fn journal_behind_head_is_cleared() {
            let temp = TempDir::new().unwrap();
            let (git, store) = setup(temp.path());
            let a = node("a");

            let mut journal = StagingJournal::begin(git.paths(), "landed", None).unwrap();
            journal.append_path(git.paths(), &a).unwrap();
            store.write(&a, "v1").unwrap();
            git.commit(&[a.clone()], "landed").unwrap();

            let report = recover_pending(&git, &store).unwrap();
            assert!(report.rolled_back.is_empty());
            assert_eq!(report.completed.len(), 1);
            assert_eq!(store.read(&a).unwrap().0, "v1");
            assert!(StagingJournal::list(git.paths()).unwrap().is_empty());
        }

        #[test]
        fn nothing_to_recover() {
            let temp = TempDir::new().unwrap();
            let (git, store) = setup(temp.path());
            assert!(recover_pending(&git, &store).unwrap().is_empty());
        }
    }
}
