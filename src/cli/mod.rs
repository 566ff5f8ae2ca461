//! cli
//!
//! Command-line interface for memvault.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Initialize logging
//! - Load configuration and apply CLI overrides
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Every handler opens a [`crate::service::MemoryService`]
//! and calls one facade operation. Results are printed as JSON on stdout;
//! logs and errors go to stderr.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::StoreConfig;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.debug);

    if let args::Command::Completion { shell } = cli.command {
        return commands::completion(shell);
    }

    let config = load_config(&cli)?;
    commands::dispatch(cli.command, config)
}

/// `RUST_LOG` wins; otherwise `--debug` selects debug for this crate.
fn init_logging(debug: bool) {
    let default = if debug { "memvault=debug" } else { "memvault=warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let loaded = StoreConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    for warning in &loaded.warnings {
        tracing::warn!(path = ?warning.path, "{}", warning.message);
    }
    if let Some(source) = &loaded.source {
        tracing::debug!(path = %source.display(), "loaded config file");
    }

    let mut config = loaded.config;
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}
