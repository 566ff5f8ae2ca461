//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. Environment variables
//! 4. CLI flags (not handled here)
//!
//! # Config File Location
//!
//! The first of these is used:
//! 1. An explicit path (`--config`), which must exist
//! 2. `$MEMVAULT_CONFIG` if set
//! 3. `<config_dir>/memvault/config.toml` (e.g. `~/.config/memvault/config.toml`)
//!
//! # Environment
//!
//! - `MEMVAULT_ROOT` - storage root
//! - `MEMVAULT_REMOTE_URL` - remote repository URL
//! - `MEMVAULT_PUSH_TOKEN` - push credential (`GITHUB_TOKEN` as fallback)
//! - `MEMVAULT_BRANCH` - branch name
//! - `MEMVAULT_GIT` - git executable
//!
//! # Example
//!
//! ```no_run
//! use memvault::core::config::StoreConfig;
//!
//! let result = StoreConfig::load(None).unwrap();
//! for warning in &result.warnings {
//!     eprintln!("warning: {}", warning.message);
//! }
//! println!("root: {}", result.config.root.display());
//! ```

pub mod schema;

pub use schema::{AuthorConfig, LimitsConfig, PushConfig, PushToken, StoreConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub path: Option<PathBuf>,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    pub config: StoreConfig,
    /// The file the config was read from, if any.
    pub source: Option<PathBuf>,
    pub warnings: Vec<ConfigWarning>,
}

impl StoreConfig {
    /// Load configuration from the standard locations and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing, if a config file
    /// cannot be parsed, or if the merged values fail validation.
    pub fn load(explicit: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_with_env(explicit, |key| std::env::var(key).ok())
    }

    /// Like [`StoreConfig::load`] with an injectable environment lookup.
    pub fn load_with_env<F>(explicit: Option<&Path>, env: F) -> Result<ConfigLoadResult, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        let source = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(&env, &mut warnings),
        };

        let mut config = match &source {
            Some(path) => Self::read_file(path)?,
            None => StoreConfig::default(),
        };
        config.validate()?;

        if config.apply_env(&env) {
            warnings.push(ConfigWarning {
                message: "using GITHUB_TOKEN as push token; set MEMVAULT_PUSH_TOKEN instead"
                    .to_string(),
                path: None,
            });
        }
        config.validate()?;

        Ok(ConfigLoadResult {
            config,
            source,
            warnings,
        })
    }

    /// Find the config file when none was given explicitly.
    fn discover<F>(env: &F, warnings: &mut Vec<ConfigWarning>) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = env("MEMVAULT_CONFIG").map(PathBuf::from) {
            if path.exists() {
                return Some(path);
            }
            warnings.push(ConfigWarning {
                message: "MEMVAULT_CONFIG points to a missing file; using defaults".to_string(),
                path: Some(path),
            });
            return None;
        }

        Self::default_path().filter(|path| path.exists())
    }

    /// `<config_dir>/memvault/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("memvault").join("config.toml"))
    }

    /// Read and parse a config file.
    pub fn read_file(path: &Path) -> Result<StoreConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply environment overrides.
    ///
    /// Returns `true` when the token came from the `GITHUB_TOKEN` fallback.
    pub fn apply_env<F>(&mut self, env: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(root) = non_empty("MEMVAULT_ROOT") {
            self.root = PathBuf::from(root);
        }
        if let Some(url) = non_empty("MEMVAULT_REMOTE_URL") {
            self.remote_url = Some(url);
        }
        if let Some(branch) = non_empty("MEMVAULT_BRANCH") {
            self.branch = branch;
        }
        if let Some(git) = non_empty("MEMVAULT_GIT") {
            self.git_executable = PathBuf::from(git);
        }

        if let Some(token) = non_empty("MEMVAULT_PUSH_TOKEN") {
            self.push_token = Some(PushToken::new(token));
        } else if self.push_token.is_none() {
            if let Some(token) = non_empty("GITHUB_TOKEN") {
                self.push_token = Some(PushToken::new(token));
                return true;
            }
        }
        false
    }
}
