//! git::manager
//!
//! Repository lifecycle, commit creation and version lookup.
//!
//! # Architecture
//!
//! [`GitManager`] owns the repository handle behind a mutex. Only the write
//! coordinator (already serialized by the write gate) calls
//! [`GitManager::commit`]; everything else is a read.
//!
//! Reads never take the repository mutex. HEAD is cached behind an `RwLock`
//! that a commit holds only for the pointer swap, and version lookups open
//! their own short-lived handle.
//!
//! # Startup
//!
//! | root                      | remote configured          | no remote       |
//! |---------------------------|----------------------------|-----------------|
//! | missing or empty          | clone                      | init            |
//! | repository                | verify or add `origin`     | open            |
//! | non-empty, not a repo     | error                      | error           |
//! | bare repository           | error                      | error           |
//!
//! # Invariants
//!
//! - HEAD only moves through [`GitManager::commit`]
//! - A failed commit leaves HEAD and the on-disk index unchanged
//! - History is linear: every commit has at most one parent

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::push::{PushStatus, PushWorker, RetryPolicy};
use super::transport::{PushError, PushTransport};
use crate::core::config::AuthorConfig;
use crate::core::node_path::NodePath;
use crate::core::paths::StorePaths;
use crate::core::types::{CommitInfo, Version};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("not a git repository: {path}")]
    NotARepository { path: PathBuf },

    #[error("bare repository not supported: {path}")]
    BareRepository { path: PathBuf },

    #[error("remote mismatch: configured '{configured}', repository has '{actual}'")]
    RepositoryMismatch { configured: String, actual: String },

    #[error("repository is on '{actual}', expected branch '{expected}'")]
    WrongBranch { expected: String, actual: String },

    #[error("clone failed: {0}")]
    Clone(#[source] PushError),

    #[error("commit failed: {0}")]
    CommitFailed(String),

    #[error("{context}: {message}")]
    Git { context: String, message: String },

    #[error("i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl GitError {
    fn git(context: &str, err: git2::Error) -> Self {
        GitError::Git {
            context: context.to_string(),
            message: err.message().to_string(),
        }
    }
}

/// Whether the store accepts writes and how its remote is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoMode {
    ReadOnly,
    Writable,
    /// Writable, but pushes are currently failing.
    PushDegraded,
}

impl std::fmt::Display for RepoMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RepoMode::ReadOnly => "read-only",
            RepoMode::Writable => "writable",
            RepoMode::PushDegraded => "push-degraded",
        })
    }
}

/// Snapshot of the repository's identity and head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryState {
    pub root_path: PathBuf,
    pub remote_url: Option<String>,
    pub branch: String,
    pub read_only: bool,
    pub last_known_head_version: Option<Version>,
}

/// Settings [`GitManager::open`] needs.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub root: PathBuf,
    pub remote_url: Option<String>,
    pub branch: String,
    pub author: AuthorConfig,
    pub read_only: bool,
    pub retry: RetryPolicy,
}

#[derive(Debug, Default)]
struct VersionCache {
    /// HEAD the entries are valid for.
    head: Option<Version>,
    entries: HashMap<NodePath, Option<Version>>,
}

/// The repository behind a memory store.
pub struct GitManager {
    repo: Mutex<git2::Repository>,
    paths: StorePaths,
    branch: String,
    author: AuthorConfig,
    remote_url: Option<String>,
    read_only: bool,
    head: RwLock<Option<Version>>,
    versions: RwLock<VersionCache>,
    push: Option<PushWorker>,
}

impl std::fmt::Debug for GitManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitManager")
            .field("root", &self.paths.root)
            .field("branch", &self.branch)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl GitManager {
    /// Open, clone or initialize the repository at `options.root`.
    ///
    /// `transport` is required when a remote is configured; it performs the
    /// clone and, for writable stores, drives the push worker.
    pub fn open(
        options: OpenOptions,
        transport: Option<Arc<dyn PushTransport>>,
    ) -> Result<Self, GitError> {
        let root = &options.root;
        let fresh = is_missing_or_empty(root)?;

        let repo = match (fresh, &options.remote_url, &transport) {
            (true, Some(url), Some(transport)) => {
                clone_repository(transport.as_ref(), root, url, &options.branch)?
            }
            (true, _, _) => init_repository(root, &options.branch)?,
            (false, _, _) => open_existing(root, options.remote_url.as_deref(), &options.branch)?,
        };

        let workdir = repo
            .workdir()
            .ok_or_else(|| GitError::BareRepository { path: root.clone() })?
            .components()
            .collect::<PathBuf>();
        let paths = StorePaths::new(workdir, repo.path().components().collect());
        let head = read_head(&repo)?;

        let push = match (&options.remote_url, transport, options.read_only) {
            (Some(_), Some(transport), false) => Some(
                PushWorker::spawn(
                    transport,
                    paths.root.clone(),
                    options.branch.clone(),
                    options.retry.clone(),
                )
                .map_err(|source| GitError::Io {
                    path: paths.root.clone(),
                    source,
                })?,
            ),
            _ => None,
        };

        info!(
            root = %paths.root.display(),
            branch = %options.branch,
            head = ?head,
            read_only = options.read_only,
            "repository ready"
        );

        Ok(Self {
            repo: Mutex::new(repo),
            paths,
            branch: options.branch,
            author: options.author,
            remote_url: options.remote_url,
            read_only: options.read_only,
            head: RwLock::new(head.clone()),
            versions: RwLock::new(VersionCache {
                head,
                entries: HashMap::new(),
            }),
            push,
        })
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn mode(&self) -> RepoMode {
        if self.read_only {
            RepoMode::ReadOnly
        } else if self.push_status().is_some_and(|s| s.is_degraded()) {
            RepoMode::PushDegraded
        } else {
            RepoMode::Writable
        }
    }

    pub fn state(&self) -> RepositoryState {
        RepositoryState {
            root_path: self.paths.root.clone(),
            remote_url: self.remote_url.clone(),
            branch: self.branch.clone(),
            read_only: self.read_only,
            last_known_head_version: self.current_head_version(),
        }
    }

    /// The cached HEAD. `None` until the first commit.
    pub fn current_head_version(&self) -> Option<Version> {
        self.head.read().clone()
    }

    /// Commit exactly `staged` as they are in the working tree.
    ///
    /// The index is rebuilt from HEAD, each staged path is added (if the file
    /// exists) or removed, and the resulting tree is committed on top of
    /// HEAD. Returns `None` when the tree equals HEAD's.
    ///
    /// On any failure before HEAD moves, the in-memory index is discarded and
    /// the on-disk index is untouched.
    pub fn commit(
        &self,
        staged: &[NodePath],
        message: &str,
    ) -> Result<Option<CommitInfo>, GitError> {
        let repo = self.repo.lock();
        let mut index = repo.index().map_err(|e| GitError::git("open index", e))?;

        let result = self.commit_with_index(&repo, &mut index, staged, message);
        if result.is_err() {
            // Drop in-memory changes; the on-disk index still matches HEAD.
            if let Err(e) = index.read(true) {
                warn!(error = %e, "failed to reload index after commit failure");
            }
        }
        result
    }

    fn commit_with_index(
        &self,
        repo: &git2::Repository,
        index: &mut git2::Index,
        staged: &[NodePath],
        message: &str,
    ) -> Result<Option<CommitInfo>, GitError> {
        let parent = match repo.head() {
            Ok(head) => Some(
                head.peel_to_commit()
                    .map_err(|e| GitError::git("resolve HEAD", e))?,
            ),
            Err(e) if is_unborn(&e) => None,
            Err(e) => return Err(GitError::git("read HEAD", e)),
        };
        let parent_tree = match &parent {
            Some(commit) => Some(commit.tree().map_err(|e| GitError::git("read HEAD tree", e))?),
            None => None,
        };

        match &parent_tree {
            Some(tree) => index
                .read_tree(tree)
                .map_err(|e| GitError::git("reset index to HEAD", e))?,
            None => index.clear().map_err(|e| GitError::git("clear index", e))?,
        }

        for path in staged {
            let rel = Path::new(path.as_str());
            if path.resolve(&self.paths.root).is_file() {
                index
                    .add_path(rel)
                    .map_err(|e| GitError::git(&format!("stage {}", path), e))?;
            } else {
                index
                    .remove_path(rel)
                    .map_err(|e| GitError::git(&format!("unstage {}", path), e))?;
            }
        }

        #[cfg(any(test, feature = "fault_injection"))]
        if fault_injection::take_commit_failure() {
            return Err(GitError::CommitFailed(
                "simulated failure for fault injection testing".into(),
            ));
        }

        let tree_oid = index
            .write_tree()
            .map_err(|e| GitError::git("write tree", e))?;
        if parent_tree.as_ref().map(|t| t.id()) == Some(tree_oid) {
            debug!("staged tree equals HEAD; nothing to commit");
            index
                .read(true)
                .map_err(|e| GitError::git("reload index", e))?;
            return Ok(None);
        }
        let tree = repo
            .find_tree(tree_oid)
            .map_err(|e| GitError::git("find tree", e))?;

        let changed: Vec<NodePath> = staged
            .iter()
            .filter(|p| blob_id(parent_tree.as_ref(), p) != blob_id(Some(&tree), p))
            .cloned()
            .collect();

        let signature = git2::Signature::now(&self.author.name, &self.author.email)
            .map_err(|e| GitError::git("build signature", e))?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .map_err(|e| GitError::git("create commit", e))?;

        // HEAD has moved; a failure to persist the index is only cosmetic.
        if let Err(e) = index.write() {
            warn!(error = %e, "commit created but index could not be written");
        }

        let version = Version::from_oid(oid);
        self.advance_head(&version, staged, parent_tree.as_ref(), &tree);

        info!(
            version = %version.short(10),
            changed = changed.len(),
            message = %message.lines().next().unwrap_or(""),
            "committed"
        );

        Ok(Some(CommitInfo {
            version,
            message: message.to_string(),
            author: format!("{} <{}>", self.author.name, self.author.email),
            timestamp: Utc::now(),
            changed_paths: changed.into_iter().map(String::from).collect(),
        }))
    }

    fn advance_head(
        &self,
        version: &Version,
        staged: &[NodePath],
        old_tree: Option<&git2::Tree<'_>>,
        new_tree: &git2::Tree<'_>,
    ) {
        let mut cache = self.versions.write();
        let mut head = self.head.write();

        if cache.head != *head {
            cache.entries.clear();
        }
        for path in staged {
            let now = blob_id(Some(new_tree), path);
            if now.is_none() {
                cache.entries.insert(path.clone(), None);
            } else if blob_id(old_tree, path) != now {
                cache.entries.insert(path.clone(), Some(version.clone()));
            }
            // Unchanged paths keep whatever was cached for them.
        }
        cache.head = Some(version.clone());
        *head = Some(version.clone());
    }

    /// The commit that last changed `path`, or `None` if it is not in HEAD.
    pub fn path_version(&self, path: &NodePath) -> Result<Option<Version>, GitError> {
        let head = self.current_head_version();
        {
            let cache = self.versions.read();
            if cache.head == head {
                if let Some(hit) = cache.entries.get(path) {
                    return Ok(hit.clone());
                }
            }
        }

        let Some(head_oid) = head.as_ref().and_then(Version::to_oid) else {
            return Ok(None);
        };
        let repo = self.reader()?;
        let version = last_change(&repo, head_oid, path)?;

        let mut cache = self.versions.write();
        if cache.head == head {
            cache.entries.insert(path.clone(), version.clone());
        }
        Ok(version)
    }

    /// Bytes of `path` in the HEAD tree.
    pub fn blob_at_head(&self, path: &NodePath) -> Result<Option<Vec<u8>>, GitError> {
        let Some(head_oid) = self.current_head_version().as_ref().and_then(Version::to_oid) else {
            return Ok(None);
        };
        let repo = self.reader()?;
        let tree = repo
            .find_commit(head_oid)
            .and_then(|c| c.tree())
            .map_err(|e| GitError::git("read HEAD tree", e))?;
        match blob_id(Some(&tree), path) {
            Some(oid) => {
                let blob = repo
                    .find_blob(oid)
                    .map_err(|e| GitError::git(&format!("read blob for {}", path), e))?;
                Ok(Some(blob.content().to_vec()))
            }
            None => Ok(None),
        }
    }

    /// Most recent commits on the first-parent chain, newest first.
    pub fn log(&self, limit: usize) -> Result<Vec<CommitInfo>, GitError> {
        let Some(mut next) = self.current_head_version().as_ref().and_then(Version::to_oid) else {
            return Ok(Vec::new());
        };
        let repo = self.reader()?;
        let mut out = Vec::new();

        while out.len() < limit {
            let commit = repo
                .find_commit(next)
                .map_err(|e| GitError::git("walk history", e))?;
            let tree = commit.tree().map_err(|e| GitError::git("read tree", e))?;
            let parent = commit.parent(0).ok();
            let parent_tree = match &parent {
                Some(p) => Some(p.tree().map_err(|e| GitError::git("read tree", e))?),
                None => None,
            };

            let diff = repo
                .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
                .map_err(|e| GitError::git("diff commit", e))?;
            let changed_paths = diff
                .deltas()
                .filter_map(|d| d.new_file().path().or_else(|| d.old_file().path()))
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .collect();

            let author = commit.author();
            out.push(CommitInfo {
                version: Version::from_oid(commit.id()),
                message: commit.message().unwrap_or("").trim_end().to_string(),
                author: format!(
                    "{} <{}>",
                    author.name().unwrap_or(""),
                    author.email().unwrap_or("")
                ),
                timestamp: DateTime::from_timestamp(author.when().seconds(), 0)
                    .unwrap_or_default(),
                changed_paths,
            });

            match parent {
                Some(p) => next = p.id(),
                None => break,
            }
        }
        Ok(out)
    }

    /// Queue HEAD for the background push. No-op without a push worker.
    pub fn schedule_push(&self, head: Version) {
        if let Some(worker) = &self.push {
            worker.notify(head);
        }
    }

    /// Push HEAD now on the calling thread.
    pub fn push_now(&self) -> Result<(), PushError> {
        let worker = self.push.as_ref().ok_or(PushError::NoRemote)?;
        if let Some(head) = self.current_head_version() {
            worker.notify(head);
        }
        worker.push_now()
    }

    pub fn push_status(&self) -> Option<PushStatus> {
        self.push.as_ref().map(PushWorker::status)
    }

    /// Wait for the push pipeline to drain. `true` if nothing is pending.
    pub fn wait_for_push(&self, timeout: Duration) -> bool {
        self.push.as_ref().map_or(true, |w| w.wait_idle(timeout))
    }

    /// Stop the push worker. Local state is never touched.
    pub fn shutdown_push(&self, grace: Duration) {
        if let Some(worker) = &self.push {
            worker.shutdown(grace);
        }
    }

    fn reader(&self) -> Result<git2::Repository, GitError> {
        git2::Repository::open(&self.paths.root).map_err(|e| GitError::git("open repository", e))
    }
}

fn is_unborn(err: &git2::Error) -> bool {
    matches!(
        err.code(),
        git2::ErrorCode::UnbornBranch | git2::ErrorCode::NotFound
    )
}

fn read_head(repo: &git2::Repository) -> Result<Option<Version>, GitError> {
    match repo.head() {
        Ok(head) => Ok(head.target().map(Version::from_oid)),
        Err(e) if is_unborn(&e) => Ok(None),
        Err(e) => Err(GitError::git("read HEAD", e)),
    }
}

fn blob_id(tree: Option<&git2::Tree<'_>>, path: &NodePath) -> Option<git2::Oid> {
    let entry = tree?.get_path(Path::new(path.as_str())).ok()?;
    (entry.kind() == Some(git2::ObjectType::Blob)).then(|| entry.id())
}

/// First-parent walk from `head` to the commit that introduced the current
/// blob at `path`.
fn last_change(
    repo: &git2::Repository,
    head: git2::Oid,
    path: &NodePath,
) -> Result<Option<Version>, GitError> {
    let mut commit = repo
        .find_commit(head)
        .map_err(|e| GitError::git("find HEAD commit", e))?;
    let tree = commit.tree().map_err(|e| GitError::git("read tree", e))?;
    let Some(target) = blob_id(Some(&tree), path) else {
        return Ok(None);
    };

    loop {
        let parent = match commit.parent(0) {
            Ok(parent) => parent,
            Err(_) => return Ok(Some(Version::from_oid(commit.id()))),
        };
        let parent_tree = parent.tree().map_err(|e| GitError::git("read tree", e))?;
        if blob_id(Some(&parent_tree), path) != Some(target) {
            return Ok(Some(Version::from_oid(commit.id())));
        }
        commit = parent;
    }
}

fn is_missing_or_empty(root: &Path) -> Result<bool, GitError> {
    match fs::read_dir(root) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(source) => Err(GitError::Io {
            path: root.to_path_buf(),
            source,
        }),
    }
}

fn init_repository(root: &Path, branch: &str) -> Result<git2::Repository, GitError> {
    fs::create_dir_all(root).map_err(|source| GitError::Io {
        path: root.to_path_buf(),
        source,
    })?;
    let mut opts = git2::RepositoryInitOptions::new();
    opts.initial_head(branch).no_reinit(true);
    let repo = git2::Repository::init_opts(root, &opts)
        .map_err(|e| GitError::git("initialize repository", e))?;
    info!(root = %root.display(), branch, "initialized new repository");
    Ok(repo)
}

fn clone_repository(
    transport: &dyn PushTransport,
    root: &Path,
    remote_url: &str,
    branch: &str,
) -> Result<git2::Repository, GitError> {
    if let Some(parent) = root.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| GitError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    info!(root = %root.display(), remote = %remote_url, "cloning repository");
    transport.clone_into(root).map_err(GitError::Clone)?;

    let repo = git2::Repository::open(root).map_err(|e| GitError::git("open clone", e))?;
    // The clone URL may carry credentials; never leave them in the config.
    repo.remote_set_url("origin", remote_url)
        .map_err(|e| GitError::git("reset origin url", e))?;
    align_cloned_branch(&repo, branch)?;
    Ok(repo)
}

/// Put a fresh clone on `branch`.
///
/// An empty remote gets an unborn `branch`. A remote that has `branch` gets
/// it checked out. A non-empty remote without `branch` is an error.
fn align_cloned_branch(repo: &git2::Repository, branch: &str) -> Result<(), GitError> {
    let local_ref = format!("refs/heads/{}", branch);
    if current_branch(repo)?.as_deref() == Some(branch) {
        return Ok(());
    }

    if read_head(repo)?.is_none() {
        return repo
            .set_head(&local_ref)
            .map_err(|e| GitError::git("set unborn HEAD", e));
    }

    let remote_ref = format!("refs/remotes/origin/{}", branch);
    let target = match repo.refname_to_id(&remote_ref) {
        Ok(oid) => oid,
        Err(_) => {
            return Err(GitError::WrongBranch {
                expected: branch.to_string(),
                actual: current_branch(repo)?.unwrap_or_else(|| "HEAD".into()),
            })
        }
    };
    let commit = repo
        .find_commit(target)
        .map_err(|e| GitError::git("find remote branch", e))?;
    let mut local = repo
        .branch(branch, &commit, false)
        .map_err(|e| GitError::git("create local branch", e))?;
    local
        .set_upstream(Some(&format!("origin/{}", branch)))
        .map_err(|e| GitError::git("set upstream", e))?;
    repo.set_head(&local_ref)
        .map_err(|e| GitError::git("switch branch", e))?;
    repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
        .map_err(|e| GitError::git("checkout branch", e))?;
    Ok(())
}

fn current_branch(repo: &git2::Repository) -> Result<Option<String>, GitError> {
    let head_ref = repo
        .find_reference("HEAD")
        .map_err(|e| GitError::git("read HEAD", e))?;
    Ok(head_ref
        .symbolic_target()
        .and_then(|t| t.strip_prefix("refs/heads/"))
        .map(String::from))
}

fn open_existing(
    root: &Path,
    remote_url: Option<&str>,
    branch: &str,
) -> Result<git2::Repository, GitError> {
    let repo = match git2::Repository::open(root) {
        Ok(repo) => repo,
        Err(e) if e.code() == git2::ErrorCode::NotFound => {
            return Err(GitError::NotARepository {
                path: root.to_path_buf(),
            })
        }
        Err(e) => return Err(GitError::git("open repository", e)),
    };
    if repo.is_bare() {
        return Err(GitError::BareRepository {
            path: root.to_path_buf(),
        });
    }

    match current_branch(&repo)? {
        Some(current) if current == branch => {}
        Some(current) => {
            return Err(GitError::WrongBranch {
                expected: branch.to_string(),
                actual: current,
            })
        }
        None => {
            return Err(GitError::WrongBranch {
                expected: branch.to_string(),
                actual: "detached HEAD".into(),
            })
        }
    }

    if let Some(configured) = remote_url {
        verify_origin(&repo, configured)?;
    }
    Ok(repo)
}

fn verify_origin(repo: &git2::Repository, configured: &str) -> Result<(), GitError> {
    match repo.find_remote("origin") {
        Ok(remote) => {
            let actual = remote.url().unwrap_or("").to_string();
            if normalize_url(&actual) != normalize_url(configured) {
                return Err(GitError::RepositoryMismatch {
                    configured: configured.to_string(),
                    actual,
                });
            }
            Ok(())
        }
        Err(e) if e.code() == git2::ErrorCode::NotFound => {
            repo.remote("origin", configured)
                .map_err(|e| GitError::git("add origin", e))?;
            info!(remote = %configured, "added missing origin remote");
            Ok(())
        }
        Err(e) => Err(GitError::git("read origin", e)),
    }
}

/// Compare remotes ignoring credentials and a trailing slash.
fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let (authority, path) = match rest.find('/') {
                Some(idx) => rest.split_at(idx),
                None => (rest, ""),
            };
            let host = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
            format!("{}://{}{}", scheme, host, path)
        }
        None => url.to_string(),
    }
}

/// Commit failure injection for rollback tests.
///
/// ```ignore
/// use memvault::git::manager::fault_injection;
///
/// fault_injection::fail_next_commit();
/// assert!(manager.commit(&paths, "msg").is_err());
/// ```
#[cfg(any(test, feature = "fault_injection"))]
pub mod fault_injection {
    use std::cell::Cell;

    thread_local! {
        static FAIL_NEXT_COMMIT: Cell<bool> = const { Cell::new(false) };
    }

    /// Make the next commit on this thread fail after staging.
    pub fn fail_next_commit() {
        FAIL_NEXT_COMMIT.with(|c| c.set(true));
    }

    pub fn reset() {
        FAIL_NEXT_COMMIT.with(|c| c.set(false));
    }

    pub(crate) fn take_commit_failure() -> bool {
        FAIL_NEXT_COMMIT.with(|c| c.replace(false))
    }
}
