//! core::ops::lock
//!
//! Exclusive owner lock for a memory root.
//!
//! # Architecture
//!
//! Exactly one service instance may own a memory root at a time. The
//! in-process write gate serializes writers inside one service; this lock
//! keeps a second process (or a second service in the same process) from
//! opening the same repository for writing.
//!
//! # Storage
//!
//! - `<git_dir>/memvault/lock` - Lock file with OS-level exclusive lock. The
//!   owner's pid is written into it for diagnostics.
//!
//! # Invariants
//!
//! - Held for the whole lifetime of a writable service
//! - Released on drop
//! - Acquisition is non-blocking (fails fast if owned elsewhere)
//!
//! # Example
//!
//! ```ignore
//! use memvault::core::ops::lock::OwnerLock;
//! use memvault::core::paths::StorePaths;
//!
//! let lock = OwnerLock::acquire(&paths)?;
//! assert!(lock.is_held());
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::StorePaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process or service already owns the root.
    #[error("memory root is owned by another memvault instance{}", holder_suffix(.holder))]
    AlreadyLocked { holder: Option<String> },

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

fn holder_suffix(holder: &Option<String>) -> String {
    match holder {
        Some(pid) => format!(" (pid {})", pid),
        None => String::new(),
    }
}

/// An exclusive lock on a memory root.
#[derive(Debug)]
pub struct OwnerLock {
    path: PathBuf,
    /// Some while the lock is held.
    file: Option<File>,
}

impl OwnerLock {
    /// Attempt to take ownership of the root described by `paths`.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another owner holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &StorePaths) -> Result<Self, LockError> {
        let state_dir = paths.state_dir();
        fs::create_dir_all(&state_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", state_dir.display(), e))
        })?;

        let path = paths.lock_path();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                // The pid is informational; failing to record it is not fatal.
                let _ = record_pid(&mut file);
                Ok(Self {
                    path,
                    file: Some(file),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                let holder = fs::read_to_string(&path)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty());
                Err(LockError::AlreadyLocked { holder })
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Try to acquire the lock, returning `None` if already owned.
    pub fn try_acquire(paths: &StorePaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            let _ = file.set_len(0);
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

fn record_pid(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", std::process::id())?;
    file.sync_all()
}

impl Drop for OwnerLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.set_len(0);
            let _ = file.unlock();
        }
    }
}
