//! engine::coordinator
//!
//! The single entry point for mutation.
//!
//! # Transaction lifecycle
//!
//! ```text
//! read-only? -> enter gate -> validate -> snapshot + checks -> journal
//!            -> stage files -> commit -> close journal -> notify push
//! ```
//!
//! 1. A read-only store fails with `ReadOnly` before anything else. The
//!    gate is entered within the configured timeout or the call fails with
//!    `Busy`.
//! 2. Every path is sanitized, content validated and the batch shape
//!    checked.
//! 3. One [`VersionSnapshot`] is captured and every expected version and
//!    existence precondition is checked against it.
//! 4. A staging journal is opened and each path is recorded in it before
//!    its file is touched.
//! 5. All staged paths become one commit.
//! 6. The push worker is notified and per-operation results are returned.
//!
//! A failure in steps 4 or 5 restores every staged path from HEAD, so the
//! working tree and HEAD are exactly as before the call.
//!
//! Operations whose content already matches the store are not staged. A
//! transaction that stages nothing, or whose tree equals HEAD, produces no
//! commit and reports existing versions.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::conflict::{ConflictDetector, VersionSnapshot};
use super::gate::WriteGate;
use super::rollback::rollback_journal;
use crate::core::config::LimitsConfig;
use crate::core::node_path::NodePath;
use crate::core::ops::StagingJournal;
use crate::core::types::{
    BatchAction, BatchOperation, BatchOutcome, CommitInfo, DeleteAck, MemoryNode, NodeMetadata,
    Version,
};
use crate::error::MemoryError;
use crate::git::{GitError, GitManager};
use crate::store::ContentStore;

/// One batch operation after validation.
#[derive(Debug, Clone)]
struct PreparedOp {
    action: BatchAction,
    path: NodePath,
    content: Option<String>,
    expected: Option<Version>,
}

/// Orchestrates validation, conflict checks, staging and commit.
#[derive(Debug)]
pub struct WriteCoordinator {
    git: Arc<GitManager>,
    store: ContentStore,
    gate: WriteGate,
    limits: LimitsConfig,
    read_only: bool,
}

impl WriteCoordinator {
    pub fn new(
        git: Arc<GitManager>,
        store: ContentStore,
        gate: WriteGate,
        limits: LimitsConfig,
    ) -> Self {
        let read_only = git.is_read_only();
        Self {
            git,
            store,
            gate,
            limits,
            read_only,
        }
    }

    pub fn gate(&self) -> &WriteGate {
        &self.gate
    }

    /// Create or overwrite the node at `path`.
    ///
    /// The commit message is `create <path>` for a new node and
    /// `update <path>` otherwise.
    pub fn write(
        &self,
        path: &str,
        content: &str,
        expected: Option<&Version>,
    ) -> Result<MemoryNode, MemoryError> {
        self.ensure_writable()?;
        let _gate = self.gate.enter()?;

        let path = self.sanitize(path)?;
        self.store.validate_content(content)?;
        let action = if self.store.exists(&path) {
            BatchAction::Update
        } else {
            BatchAction::Create
        };
        let message = format!("{} {}", action, path);
        let op = PreparedOp {
            action,
            path,
            content: Some(content.to_string()),
            expected: expected.cloned(),
        };

        match self.transact(vec![op], &message)?.pop() {
            Some(BatchOutcome::Written(node)) => Ok(node),
            _ => Err(MemoryError::CommitFailure(
                "write produced no node outcome".into(),
            )),
        }
    }

    /// Delete the node at `path`.
    pub fn delete(&self, path: &str, expected: Option<&Version>) -> Result<DeleteAck, MemoryError> {
        self.ensure_writable()?;
        let _gate = self.gate.enter()?;

        let path = self.sanitize(path)?;
        let message = format!("{} {}", BatchAction::Delete, path);
        let op = PreparedOp {
            action: BatchAction::Delete,
            path,
            content: None,
            expected: expected.cloned(),
        };

        match self.transact(vec![op], &message)?.pop() {
            Some(BatchOutcome::Deleted(ack)) => Ok(ack),
            _ => Err(MemoryError::CommitFailure(
                "delete produced no outcome".into(),
            )),
        }
    }

    /// Apply `ops` atomically as one commit with `message`.
    ///
    /// Results are returned in request order. Nothing is written unless
    /// every operation passes validation and its preconditions.
    pub fn apply_batch(
        &self,
        ops: &[BatchOperation],
        message: &str,
    ) -> Result<Vec<BatchOutcome>, MemoryError> {
        self.ensure_writable()?;
        let _gate = self.gate.enter()?;

        let message = self.validate_message(message)?;
        let prepared = self.prepare_batch(ops)?;
        self.transact(prepared, &message)
    }

    fn ensure_writable(&self) -> Result<(), MemoryError> {
        if self.read_only {
            return Err(MemoryError::ReadOnly);
        }
        Ok(())
    }

    fn sanitize(&self, raw: &str) -> Result<NodePath, MemoryError> {
        self.store
            .validator()
            .sanitize(raw)
            .map_err(|e| MemoryError::invalid_path(raw, e))
    }

    fn validate_message(&self, message: &str) -> Result<String, MemoryError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(MemoryError::InvalidBatch(
                "commit message cannot be empty".into(),
            ));
        }
        let chars = trimmed.chars().count();
        if chars > self.limits.max_message_chars {
            return Err(MemoryError::InvalidBatch(format!(
                "commit message too long ({} chars, max {})",
                chars, self.limits.max_message_chars
            )));
        }
        Ok(trimmed.to_string())
    }

    fn prepare_batch(&self, ops: &[BatchOperation]) -> Result<Vec<PreparedOp>, MemoryError> {
        if ops.is_empty() {
            return Err(MemoryError::InvalidBatch(
                "batch must contain at least one operation".into(),
            ));
        }
        if ops.len() > self.limits.max_batch_operations {
            return Err(MemoryError::InvalidBatch(format!(
                "batch has {} operations, max {}",
                ops.len(),
                self.limits.max_batch_operations
            )));
        }

        let mut seen = HashSet::new();
        let mut prepared = Vec::with_capacity(ops.len());
        for (index, op) in ops.iter().enumerate() {
            let path = self.sanitize(&op.path)?;
            if !seen.insert(path.clone()) {
                return Err(MemoryError::InvalidBatch(format!(
                    "operation {} repeats path '{}'",
                    index, path
                )));
            }

            let content = if op.action.needs_content() {
                let content = op.content.as_deref().ok_or_else(|| {
                    MemoryError::InvalidBatch(format!(
                        "operation {} ({} {}) is missing content",
                        index, op.action, path
                    ))
                })?;
                self.store.validate_content(content)?;
                Some(content.to_string())
            } else {
                None
            };

            prepared.push(PreparedOp {
                action: op.action,
                path,
                content,
                expected: op.expected_version.clone(),
            });
        }
        Ok(prepared)
    }

    /// Steps 3 to 6. The caller holds the gate and has validated `ops`.
    fn transact(&self, ops: Vec<PreparedOp>, message: &str) -> Result<Vec<BatchOutcome>, MemoryError> {
        let snapshot = VersionSnapshot::capture(&self.git, ops.iter().map(|op| &op.path))?;
        let detector = ConflictDetector::new(&snapshot);
        for op in &ops {
            detector.check(&op.path, op.expected.as_ref())?;
            if matches!(op.action, BatchAction::Update | BatchAction::Delete)
                && !self.store.exists(&op.path)
            {
                return Err(MemoryError::NotFound(op.path.to_string()));
            }
        }

        let mut to_stage = Vec::new();
        for op in &ops {
            if self.is_noop(op)? {
                debug!(path = %op.path, "content unchanged; not staging");
            } else {
                to_stage.push(op);
            }
        }

        let commit = if to_stage.is_empty() {
            None
        } else {
            self.stage_and_commit(&to_stage, message, snapshot.head().cloned())?
        };

        if let Some(info) = &commit {
            self.git.schedule_push(info.version.clone());
        }

        ops.into_iter()
            .map(|op| self.outcome(op, &snapshot, commit.as_ref()))
            .collect()
    }

    fn is_noop(&self, op: &PreparedOp) -> Result<bool, MemoryError> {
        match &op.content {
            Some(content) => Ok(self
                .store
                .read_bytes(&op.path)?
                .is_some_and(|current| current == content.as_bytes())),
            None => Ok(false),
        }
    }

    fn stage_and_commit(
        &self,
        ops: &[&PreparedOp],
        message: &str,
        base: Option<Version>,
    ) -> Result<Option<CommitInfo>, MemoryError> {
        let paths = self.git.paths();
        let mut journal = StagingJournal::begin(paths, message, base)?;

        let mut staged: Result<(), MemoryError> = Ok(());
        for op in ops {
            staged = self.stage(&mut journal, op);
            if staged.is_err() {
                break;
            }
        }
        let committed = staged.and_then(|()| {
            self.git
                .commit(&journal.paths, message)
                .map_err(|e| match e {
                    GitError::CommitFailed(reason) => MemoryError::CommitFailure(reason),
                    other => MemoryError::CommitFailure(other.to_string()),
                })
        });

        match committed {
            Ok(commit) => {
                if let Err(e) = journal.mark_committed(paths, commit.as_ref().map(|c| c.version.clone())) {
                    warn!(txn = %journal.txn_id, error = %e, "could not mark journal committed");
                }
                if let Err(e) = journal.finish(paths) {
                    warn!(txn = %journal.txn_id, error = %e, "could not remove journal");
                }
                Ok(commit)
            }
            Err(err) => {
                let result = rollback_journal(&self.git, &self.store, &journal);
                warn!(
                    txn = %journal.txn_id,
                    error = %err,
                    summary = %result.summary(),
                    "transaction rolled back"
                );
                if result.is_complete() {
                    if let Err(e) = journal.mark_rolled_back(paths) {
                        warn!(txn = %journal.txn_id, error = %e, "could not mark journal rolled back");
                    }
                    if let Err(e) = journal.finish(paths) {
                        warn!(txn = %journal.txn_id, error = %e, "could not remove journal");
                    }
                }
                // An incomplete rollback keeps its journal for startup recovery.
                Err(err)
            }
        }
    }

    fn stage(&self, journal: &mut StagingJournal, op: &PreparedOp) -> Result<(), MemoryError> {
        let prior = self.store.read_bytes(&op.path)?;
        journal.append_with_prior(self.git.paths(), &op.path, prior.as_deref())?;
        match &op.content {
            Some(content) => {
                self.store.write(&op.path, content)?;
            }
            None => {
                self.store.remove_if_exists(&op.path)?;
            }
        }
        Ok(())
    }

    fn outcome(
        &self,
        op: PreparedOp,
        snapshot: &VersionSnapshot,
        commit: Option<&CommitInfo>,
    ) -> Result<BatchOutcome, MemoryError> {
        match op.content {
            Some(content) => {
                let stat = self.store.stat(&op.path)?;
                let version = self.git.path_version(&op.path)?;
                Ok(BatchOutcome::Written(MemoryNode {
                    path: op.path,
                    content,
                    metadata: NodeMetadata {
                        created_at: stat.created_at,
                        updated_at: stat.updated_at,
                        size: stat.size,
                        version,
                    },
                }))
            }
            None => {
                let version = match commit {
                    Some(info) => Some(info.version.clone()),
                    None => snapshot.version_of(&op.path).cloned(),
                };
                info!(path = %op.path, "deleted node");
                Ok(BatchOutcome::Deleted(DeleteAck {
                    path: op.path,
                    version,
                }))
            }
        }
    }
}
