//! service
//!
//! The facade callers talk to.
//!
//! # Startup
//!
//! [`MemoryService::open`] runs, in order:
//!
//! 1. validate the configuration
//! 2. open, clone or initialize the repository and verify its remote
//! 3. take the exclusive owner lock on the repository
//! 4. recover transactions a previous process left half-staged
//! 5. queue a push of HEAD, in case earlier commits never reached the remote
//!
//! Any failure is fatal and the service does not start.
//!
//! # Reads and writes
//!
//! Reads go straight to the content store and the version cache and never
//! wait on a writer. Mutations go through the [`WriteCoordinator`].
//!
//! # Example
//!
//! ```no_run
//! use memvault::core::config::{PushToken, StoreConfig};
//! use memvault::service::MemoryService;
//!
//! let mut config = StoreConfig::for_root("/srv/memory");
//! config.push_token = Some(PushToken::new("token"));
//! let service = MemoryService::open(config)?;
//! let node = service.write("notes/today", "# Today", None)?;
//! let read = service.read("notes/today")?;
//! assert_eq!(read.version(), node.version());
//! # Ok::<(), memvault::error::MemoryError>(())
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::core::config::StoreConfig;
use crate::core::node_path::{NodePath, PathValidator};
use crate::core::ops::OwnerLock;
use crate::core::types::{
    BatchOperation, BatchOutcome, CommitInfo, DeleteAck, ListedNode, MemoryNode, NodeListing,
    NodeMetadata, Version,
};
use crate::engine::{recover_pending, WriteCoordinator, WriteGate};
use crate::error::MemoryError;
use crate::git::{
    GitCliTransport, GitExecutable, GitManager, OpenOptions, PushStatus, PushTransport, RepoMode,
    RetryPolicy,
};
use crate::store::ContentStore;

const PUSH_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Listing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Directory-like prefix; empty means the root.
    pub prefix: String,
    pub recursive: bool,
    pub include_content: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            recursive: true,
            include_content: false,
            offset: 0,
            limit: None,
        }
    }
}

/// Health and identity of a running store.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub mode: RepoMode,
    pub root: String,
    pub branch: String,
    pub remote_url: Option<String>,
    pub head: Option<Version>,
    /// `None` when the store has no push worker.
    pub push: Option<PushStatus>,
}

/// A git-backed memory store.
pub struct MemoryService {
    git: Arc<GitManager>,
    store: ContentStore,
    coordinator: WriteCoordinator,
    lock: Mutex<Option<OwnerLock>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryService")
            .field("git", &self.git)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl MemoryService {
    /// Start a service with the git executable as its remote transport.
    pub fn open(config: StoreConfig) -> Result<Self, MemoryError> {
        let transport = config.remote_url.as_ref().map(|url| {
            Arc::new(GitCliTransport::new(
                GitExecutable::new(&config.git_executable),
                url.clone(),
                config.push_token.clone(),
                config.push.timeout(),
            )) as Arc<dyn PushTransport>
        });
        Self::open_with_transport(config, transport)
    }

    /// Start a service with a caller-supplied transport.
    pub fn open_with_transport(
        config: StoreConfig,
        transport: Option<Arc<dyn PushTransport>>,
    ) -> Result<Self, MemoryError> {
        config.validate()?;

        let git = GitManager::open(
            OpenOptions {
                root: config.root.clone(),
                remote_url: config.remote_url.clone(),
                branch: config.branch.clone(),
                author: config.author.clone(),
                read_only: config.is_read_only(),
                retry: RetryPolicy::from(&config.push),
            },
            transport,
        )?;
        let lock = OwnerLock::acquire(git.paths())?;
        let git = Arc::new(git);

        let store = ContentStore::new(
            git.root(),
            PathValidator::new(config.path_limits()),
            config.limits.max_content_bytes,
        );

        let report = recover_pending(&git, &store)?;
        if !report.is_empty() {
            info!(
                rolled_back = report.rolled_back.len(),
                completed = report.completed.len(),
                "startup recovery finished"
            );
        }
        for (path, reason) in &report.failed {
            warn!(path = %path, error = %reason, "path left unrestored by recovery");
        }

        if let Some(head) = git.current_head_version() {
            git.schedule_push(head);
        }

        let coordinator = WriteCoordinator::new(
            Arc::clone(&git),
            store.clone(),
            WriteGate::new(config.write_lock_timeout()),
            config.limits.clone(),
        );

        info!(
            root = %git.root().display(),
            mode = %git.mode(),
            "memory service started"
        );

        Ok(Self {
            git,
            store,
            coordinator,
            lock: Mutex::new(Some(lock)),
            closed: AtomicBool::new(false),
        })
    }

    /// Read the node at `path`.
    pub fn read(&self, path: &str) -> Result<MemoryNode, MemoryError> {
        let path = self.sanitize(path)?;
        let (content, stat) = self.store.read(&path)?;
        let version = self.git.path_version(&path)?;
        Ok(MemoryNode {
            path,
            content,
            metadata: NodeMetadata {
                created_at: stat.created_at,
                updated_at: stat.updated_at,
                size: stat.size,
                version,
            },
        })
    }

    /// Create or overwrite a node. See [`WriteCoordinator::write`].
    pub fn write(
        &self,
        path: &str,
        content: &str,
        expected: Option<&Version>,
    ) -> Result<MemoryNode, MemoryError> {
        self.coordinator.write(path, content, expected)
    }

    pub fn delete(&self, path: &str, expected: Option<&Version>) -> Result<DeleteAck, MemoryError> {
        self.coordinator.delete(path, expected)
    }

    /// Apply several operations as one commit.
    pub fn apply_batch(
        &self,
        ops: &[BatchOperation],
        message: &str,
    ) -> Result<Vec<BatchOutcome>, MemoryError> {
        self.coordinator.apply_batch(ops, message)
    }

    pub fn current_head_version(&self) -> Option<Version> {
        self.git.current_head_version()
    }

    pub fn is_read_only(&self) -> bool {
        self.git.is_read_only()
    }

    pub fn exists(&self, path: &str) -> Result<bool, MemoryError> {
        Ok(self.store.exists(&self.sanitize(path)?))
    }

    /// List nodes under a prefix, sorted by path.
    pub fn list(&self, options: &ListOptions) -> Result<NodeListing, MemoryError> {
        let prefix = self
            .store
            .validator()
            .sanitize_prefix(&options.prefix)
            .map_err(|e| MemoryError::invalid_path(&options.prefix, e))?;
        let all = self.store.list(&prefix, options.recursive)?;
        let total = all.len();

        let page = all
            .into_iter()
            .skip(options.offset)
            .take(options.limit.unwrap_or(usize::MAX));

        let mut nodes = Vec::new();
        for path in page {
            // A node deleted between listing and stat is skipped.
            let Ok(stat) = self.store.stat(&path) else {
                continue;
            };
            let content = if options.include_content {
                match self.store.read(&path) {
                    Ok((content, _)) => Some(content),
                    Err(_) => continue,
                }
            } else {
                None
            };
            let version = self.git.path_version(&path)?;
            nodes.push(ListedNode {
                path,
                metadata: NodeMetadata {
                    created_at: stat.created_at,
                    updated_at: stat.updated_at,
                    size: stat.size,
                    version,
                },
                content,
            });
        }

        let directories = if options.recursive {
            Vec::new()
        } else {
            self.store.subdirectories(&prefix)?
        };

        Ok(NodeListing {
            prefix,
            recursive: options.recursive,
            total,
            offset: options.offset,
            limit: options.limit,
            nodes,
            directories,
        })
    }

    pub fn status(&self) -> ServiceStatus {
        let state = self.git.state();
        ServiceStatus {
            mode: self.git.mode(),
            root: state.root_path.display().to_string(),
            branch: state.branch,
            remote_url: state.remote_url,
            head: state.last_known_head_version,
            push: self.git.push_status(),
        }
    }

    /// Most recent commits, newest first.
    pub fn history(&self, limit: usize) -> Result<Vec<CommitInfo>, MemoryError> {
        Ok(self.git.log(limit)?)
    }

    /// Push HEAD now and report the result.
    pub fn push_now(&self) -> Result<(), MemoryError> {
        if self.git.is_read_only() {
            return Err(MemoryError::ReadOnly);
        }
        Ok(self.git.push_now()?)
    }

    /// Wait for the background push to catch up with HEAD.
    pub fn wait_for_push(&self, timeout: Duration) -> bool {
        self.git.wait_for_push(timeout)
    }

    /// Let any in-flight mutation finish, stop the push worker and release
    /// the owner lock. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.coordinator.gate().drain();
        self.git.shutdown_push(PUSH_SHUTDOWN_GRACE);
        if let Some(mut lock) = self.lock.lock().take() {
            if let Err(e) = lock.release() {
                warn!(error = %e, "failed to release owner lock");
            }
        }
        info!(root = %self.git.root().display(), "memory service stopped");
    }

    fn sanitize(&self, raw: &str) -> Result<NodePath, MemoryError> {
        self.store
            .validator()
            .sanitize(raw)
            .map_err(|e| MemoryError::invalid_path(raw, e))
    }
}

impl Drop for MemoryService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
