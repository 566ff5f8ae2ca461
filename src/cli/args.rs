//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--root <path>`: Memory root, overriding config and environment
//! - `--config <path>`: Config file to load
//! - `--debug`: Enable debug logging on stderr

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// memvault - a git-versioned markdown memory store
#[derive(Parser, Debug)]
#[command(name = "memvault")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Memory root directory (overrides config and MEMVAULT_ROOT)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Config file (default: $MEMVAULT_CONFIG, then the user config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show mode, head and push state
    #[command(
        name = "status",
        after_help = "\
EXAMPLES:
    memvault status
    memvault --root ./memory status"
    )]
    Status,

    /// Read a node
    #[command(
        name = "read",
        after_help = "\
EXAMPLES:
    # Full node as JSON, including its version
    memvault read notes/today

    # Just the markdown
    memvault read notes/today --raw"
    )]
    Read {
        /// Node path (`.md` is appended when missing)
        path: String,

        /// Print only the content
        #[arg(long)]
        raw: bool,
    },

    /// Create or overwrite a node
    #[command(
        name = "write",
        long_about = "Create or overwrite a node.\n\n\
            Content comes from --content, from --file, or from stdin. Pass the \
            version you last read with --expect to fail instead of overwriting \
            someone else's change.",
        after_help = "\
EXAMPLES:
    memvault write notes/today --content '# Today'
    memvault write notes/today --file today.md --expect 3f2a...
    echo '# Today' | memvault write notes/today"
    )]
    Write {
        /// Node path
        path: String,

        /// Content to write
        #[arg(long, conflicts_with = "file")]
        content: Option<String>,

        /// Read content from a file
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,

        /// Expected current version
        #[arg(long, value_name = "VERSION")]
        expect: Option<String>,
    },

    /// Delete a node
    #[command(name = "delete")]
    Delete {
        /// Node path
        path: String,

        /// Expected current version
        #[arg(long, value_name = "VERSION")]
        expect: Option<String>,
    },

    /// Apply a JSON batch as one commit
    #[command(
        name = "batch",
        long_about = "Apply a batch of operations as one atomic commit.\n\n\
            The file holds {\"message\": ..., \"operations\": [...]}. Each operation \
            has an action (create, update, delete), a path, content for create and \
            update, and an optional expected_version. Use - to read stdin.",
        after_help = "\
EXAMPLES:
    memvault batch import.json
    cat import.json | memvault batch -"
    )]
    Batch {
        /// Batch file, or - for stdin
        file: PathBuf,
    },

    /// List nodes
    #[command(name = "list")]
    List {
        /// Directory prefix (default: the root)
        prefix: Option<String>,

        /// Only nodes directly inside the prefix
        #[arg(long)]
        shallow: bool,

        /// Include node content
        #[arg(long)]
        content: bool,

        /// Skip this many nodes
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Return at most this many nodes
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show recent commits
    #[command(name = "log")]
    Log {
        /// Number of commits
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },

    /// Push HEAD to the remote now
    #[command(name = "push")]
    Push,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    memvault completion bash >> ~/.bashrc
    memvault completion fish > ~/.config/fish/completions/memvault.fish"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
