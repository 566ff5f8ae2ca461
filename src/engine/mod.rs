//! engine
//!
//! Turns requests into atomic, conflict-checked commits.
//!
//! # Architecture
//!
//! The engine is the only component allowed to mutate the store. Every
//! mutation follows the same lifecycle:
//!
//! ```text
//! Gate -> Validate -> Check -> Stage -> Commit -> Notify
//! ```
//!
//! - [`gate`] serializes mutations with a bounded wait
//! - [`conflict`] checks expected versions against one snapshot
//! - [`coordinator`] runs the lifecycle end to end
//! - [`rollback`] restores staged paths after a failure or a crash
//!
//! # Invariants
//!
//! - At most one mutation is in flight
//! - A mutation produces exactly one commit or none at all
//! - A failed mutation leaves HEAD and the working tree unchanged
//! - Every staged path is journaled before its file is touched
//!
//! # Example
//!
//! ```ignore
//! use memvault::engine::{WriteCoordinator, WriteGate};
//!
//! let coordinator = WriteCoordinator::new(git, store, WriteGate::new(timeout), limits);
//! let node = coordinator.write("notes/today", "# Today", None)?;
//! let again = coordinator.write("notes/today", "# Today\n- ship", node.version())?;
//! ```

pub mod conflict;
pub mod coordinator;
pub mod gate;
pub mod rollback;

pub use conflict::{ConflictDetector, VersionSnapshot};
pub use coordinator::WriteCoordinator;
pub use gate::{GateGuard, WriteGate};
pub use rollback::{recover_pending, rollback_journal, RecoveryReport, RollbackResult};
