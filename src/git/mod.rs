//! git
//!
//! Everything that touches the repository or its remote.
//!
//! # Architecture
//!
//! This module is the only doorway to git. No other module imports `git2` or
//! spawns the git executable.
//!
//! - [`manager`] owns the repository: startup, commits, versions, history
//! - [`push`] pushes HEAD in the background with bounded backoff
//! - [`transport`] is the seam to the remote ([`PushTransport`])
//! - `exec` runs the git executable with a timeout and cancel flag
//!
//! Local operations use `git2` in-process. Clone and push go through the git
//! executable so they honour the host's network and credential setup, with
//! the push token injected per invocation.
//!
//! # Invariants
//!
//! - History on the configured branch is linear
//! - A failed push never rewrites or discards a local commit
//! - Tokens never appear in logs, errors or the repository config
//!
//! # Example
//!
//! ```ignore
//! use memvault::git::{GitManager, OpenOptions};
//!
//! let git = GitManager::open(options, None)?;
//! if let Some(info) = git.commit(&[path], "update notes")? {
//!     git.schedule_push(info.version);
//! }
//! ```

mod exec;
pub mod manager;
mod push;
mod transport;

pub use exec::{ExecError, GitExecutable, GitOutput};
pub use manager::{GitError, GitManager, OpenOptions, RepoMode, RepositoryState};
pub use push::{PushStatus, PushWorker, RetryPolicy};
pub use transport::{authenticated_url, redact, GitCliTransport, PushError, PushTransport};
