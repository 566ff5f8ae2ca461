//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Validates command-specific arguments
//! 2. Calls one [`MemoryService`] operation
//! 3. Prints the result as JSON
//!
//! Handlers do NOT touch the repository directly.
//!
//! # Pushing
//!
//! Commands that commit wait up to the configured push timeout for the
//! background push before exiting. Anything still unpushed is pushed by the
//! next process that opens the store.

mod batch;
mod completion;
mod delete;
mod list;
mod log_cmd;
mod push;
mod read;
mod status;
mod write;

pub use batch::batch;
pub use completion::completion;
pub use delete::delete;
pub use list::list;
pub use log_cmd::log;
pub use push::push;
pub use read::read;
pub use status::status;
pub use write::write;

use anyhow::{Context as _, Result};
use serde::Serialize;

use super::args::Command;
use crate::core::config::StoreConfig;
use crate::core::types::Version;
use crate::service::MemoryService;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, config: StoreConfig) -> Result<()> {
    let push_timeout = config.push.timeout();
    let service = MemoryService::open(config).context("failed to open memory store")?;

    let commits = matches!(
        command,
        Command::Write { .. } | Command::Delete { .. } | Command::Batch { .. }
    );

    let result = match command {
        Command::Status => status::status(&service),
        Command::Read { path, raw } => read::read(&service, &path, raw),
        Command::Write {
            path,
            content,
            file,
            expect,
        } => write::write(&service, &path, content, file.as_deref(), expect.as_deref()),
        Command::Delete { path, expect } => delete::delete(&service, &path, expect.as_deref()),
        Command::Batch { file } => batch::batch(&service, &file),
        Command::List {
            prefix,
            shallow,
            content,
            offset,
            limit,
        } => list::list(&service, prefix.unwrap_or_default(), !shallow, content, offset, limit),
        Command::Log { limit } => log_cmd::log(&service, limit),
        Command::Push => push::push(&service),
        Command::Completion { shell } => completion::completion(shell),
    };

    if commits && result.is_ok() && !service.wait_for_push(push_timeout) {
        tracing::warn!("push still pending; it will be retried when the store is next opened");
    }
    service.shutdown();
    result
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn parse_expected(raw: Option<&str>) -> Result<Option<Version>> {
    raw.map(|v| Version::new(v).with_context(|| format!("invalid --expect version '{}'", v)))
        .transpose()
}
