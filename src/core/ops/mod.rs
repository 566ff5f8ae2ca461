//! core::ops
//!
//! Transaction journaling and root ownership.
//!
//! # Modules
//!
//! - [`journal`] - Write-ahead staging journal for rollback and recovery
//! - [`lock`] - Exclusive owner lock on a memory root
//!
//! # Architecture
//!
//! A writable service:
//! 1. Acquires the owner lock at startup and holds it until shutdown
//! 2. Rolls back any staging journal left behind by a crash
//!
//! Each write transaction then:
//! 1. Opens a staging journal before touching the working tree
//! 2. Appends every path before staging it
//! 3. On commit or rollback, deletes the journal

pub mod journal;
pub mod lock;

pub use journal::{JournalError, PriorContent, PriorImage, StagingJournal, TxnId, TxnPhase};
pub use lock::{LockError, OwnerLock};
