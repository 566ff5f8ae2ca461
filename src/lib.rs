//! memvault - a git-versioned markdown memory store
//!
//! memvault keeps one markdown file per node in a git working tree and turns
//! every mutation into exactly one commit. Several callers can share a store:
//! writes are serialized and conflict-checked, reads never wait, and pushes
//! to a remote happen in the background without ever putting local commits
//! at risk.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, calls the service)
//! - [`service`] - The facade: startup, reads, and delegation of writes
//! - [`engine`] - Write gate, conflict checks, transactions, rollback
//! - [`store`] - Markdown files on disk
//! - [`git`] - Repository, commits, versions and the push worker
//! - [`core`] - Domain types, path validation, config, journal, lock
//! - [`error`] - The caller-facing error taxonomy
//!
//! # Correctness Invariants
//!
//! memvault maintains the following invariants:
//!
//! 1. Every successful mutation is exactly one commit on a linear history
//! 2. A failed mutation leaves HEAD and the working tree unchanged
//! 3. A node's version changes if and only if its content changes
//! 4. A failed push never discards or rewrites a local commit

pub mod cli;
pub mod core;
pub mod engine;
pub mod error;
pub mod git;
pub mod service;
pub mod store;
