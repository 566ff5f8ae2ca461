//! core
//!
//! Core domain types, schemas, and operations for memvault.
//!
//! # Modules
//!
//! - [`types`] - Strong types: Version, MemoryNode, BatchOperation, etc.
//! - [`node_path`] - Node path sanitization
//! - [`ops`] - Staging journal and owner lock
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Centralized path routing for service state
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - A node path can only be obtained from the validator
//! - Schemas are strict and self-describing

pub mod config;
pub mod node_path;
pub mod ops;
pub mod paths;
pub mod types;
