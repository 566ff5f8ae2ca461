//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Example
//!
//! ```toml
//! root = "/srv/memory"
//! remote_url = "https://github.com/acme/memory.git"
//! branch = "main"
//! write_lock_timeout_ms = 5000
//!
//! [author]
//! name = "memvault"
//! email = "memvault@localhost"
//!
//! [limits]
//! max_content_bytes = 10000000
//! max_batch_operations = 100
//!
//! [push]
//! max_attempts = 4
//! initial_delay_ms = 1000
//! ```
//!
//! # Validation
//!
//! Values are validated after parsing and again after environment overrides
//! are applied, so a bad value is reported before the repository is opened.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::node_path::PathLimits;

/// Top-level store configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Working tree root holding the memory nodes.
    pub root: PathBuf,

    /// Remote to clone from and push to. `None` keeps the store local.
    pub remote_url: Option<String>,

    /// Credential for pushing. Without it a remote-backed store is read-only.
    pub push_token: Option<PushToken>,

    /// Branch that receives commits.
    pub branch: String,

    /// Path or name of the git executable used for clone and push.
    pub git_executable: PathBuf,

    /// Bound on waiting for the write gate.
    pub write_lock_timeout_ms: u64,

    pub author: AuthorConfig,
    pub limits: LimitsConfig,
    pub push: PushConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("memory"),
            remote_url: None,
            push_token: None,
            branch: "main".to_string(),
            git_executable: PathBuf::from("git"),
            write_lock_timeout_ms: 5_000,
            author: AuthorConfig::default(),
            limits: LimitsConfig::default(),
            push: PushConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Defaults rooted at `root`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue("root cannot be empty".into()));
        }

        if let Some(url) = &self.remote_url {
            if url.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote_url cannot be empty".into(),
                ));
            }
        }

        if let Some(token) = &self.push_token {
            if token.expose().trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "push_token cannot be empty".into(),
                ));
            }
        }

        let branch_ref = format!("refs/heads/{}", self.branch);
        if self.branch.is_empty() || !git2::Reference::is_valid_name(&branch_ref) {
            return Err(ConfigError::InvalidValue(format!(
                "invalid branch name '{}'",
                self.branch
            )));
        }

        if self.git_executable.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "git_executable cannot be empty".into(),
            ));
        }

        if self.write_lock_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "write_lock_timeout_ms must be positive".into(),
            ));
        }

        self.author.validate()?;
        self.limits.validate()?;
        self.push.validate()?;
        Ok(())
    }

    /// Whether the store rejects writes.
    ///
    /// The push credential alone decides this. A token without a remote
    /// gives a writable local store that never pushes.
    pub fn is_read_only(&self) -> bool {
        self.push_token.is_none()
    }

    pub fn write_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.write_lock_timeout_ms)
    }

    pub fn path_limits(&self) -> PathLimits {
        PathLimits {
            max_path_bytes: self.limits.max_path_bytes,
            max_segments: self.limits.max_segments,
        }
    }
}

/// Push credential. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PushToken(String);

impl PushToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw credential, for building an authenticated URL.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PushToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PushToken(***)")
    }
}

/// Commit author identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: "memvault".to_string(),
            email: "memvault@localhost".to_string(),
        }
    }
}

impl AuthorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "author name and email cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Size limits for paths, content and batches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    pub max_content_bytes: usize,
    pub max_path_bytes: usize,
    pub max_segments: usize,
    pub max_batch_operations: usize,
    pub max_message_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let paths = PathLimits::default();
        Self {
            max_content_bytes: 10_000_000,
            max_path_bytes: paths.max_path_bytes,
            max_segments: paths.max_segments,
            max_batch_operations: 100,
            max_message_chars: 256,
        }
    }
}

impl LimitsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_content_bytes", self.max_content_bytes),
            ("max_path_bytes", self.max_path_bytes),
            ("max_segments", self.max_segments),
            ("max_batch_operations", self.max_batch_operations),
            ("max_message_chars", self.max_message_chars),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "limits.{} must be positive",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Push retry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PushConfig {
    /// Attempts per push cycle.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Pause between cycles once a cycle's attempts are exhausted.
    pub retry_cycle_secs: u64,
    /// Per-attempt timeout for the git executable.
    pub timeout_secs: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2.0,
            retry_cycle_secs: 60,
            timeout_secs: 30,
        }
    }
}

impl PushConfig {
    /// Bound on a single clone or push invocation.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "push.max_attempts must be at least 1".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue(
                "push.multiplier must be a finite number >= 1.0".into(),
            ));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(ConfigError::InvalidValue(
                "push.max_delay_ms must be >= push.initial_delay_ms".into(),
            ));
        }
        if self.retry_cycle_secs == 0 || self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "push.retry_cycle_secs and push.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod store_config {
        use super::*;

        #[test]
        fn defaults_are_valid() {
            let config = StoreConfig::default();
            assert!(config.validate().is_ok());
            assert_eq!(config.branch, "main");
            assert_eq!(config.limits.max_content_bytes, 10_000_000);
            assert_eq!(config.limits.max_batch_operations, 100);
            assert_eq!(config.write_lock_timeout(), Duration::from_secs(5));
        }

        #[test]
        fn parse_full() {
            let toml = r#"
                root = "/srv/memory"
                remote_url = "https://example.com/m.git"
                push_token = "secret"
                branch = "trunk"

                [author]
                name = "bot"
                email = "bot@example.com"

                [limits]
                max_batch_operations = 10

                [push]
                max_attempts = 2
            "#;
            let config: StoreConfig = toml::from_str(toml).unwrap();
            assert_eq!(config.root, PathBuf::from("/srv/memory"));
            assert_eq!(config.push_token, Some(PushToken::new("secret")));
            assert_eq!(config.branch, "trunk");
            assert_eq!(config.author.name, "bot");
            assert_eq!(config.limits.max_batch_operations, 10);
            assert_eq!(config.limits.max_content_bytes, 10_000_000);
            assert_eq!(config.push.max_attempts, 2);
            assert_eq!(config.push.initial_delay_ms, 1_000);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn reject_unknown_fields() {
            let result: Result<StoreConfig, _> = toml::from_str("unknown = 1");
            assert!(result.is_err());
            let result: Result<StoreConfig, _> = toml::from_str("[push]\nbogus = 1");
            assert!(result.is_err());
        }

        #[test]
        fn read_only_follows_push_token() {
            let mut config = StoreConfig::for_root("/m");
            assert!(config.is_read_only());

            config.remote_url = Some("https://example.com/m.git".into());
            assert!(config.is_read_only());

            config.push_token = Some(PushToken::new("t"));
            assert!(!config.is_read_only());

            config.remote_url = None;
            assert!(!config.is_read_only());
        }

        #[test]
        fn invalid_branch() {
            let mut config = StoreConfig::default();
            config.branch = "has space".into();
            assert!(config.validate().is_err());
            config.branch = String::new();
            assert!(config.validate().is_err());
        }

        #[test]
        fn empty_token_rejected() {
            let mut config = StoreConfig::default();
            config.push_token = Some(PushToken::new("  "));
            assert!(config.validate().is_err());
        }
    }

    mod sections {
        use super::*;

        #[test]
        fn zero_limit_rejected() {
            let mut config = StoreConfig::default();
            config.limits.max_batch_operations = 0;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("max_batch_operations"));
        }

        #[test]
        fn push_multiplier_must_grow() {
            let mut config = StoreConfig::default();
            config.push.multiplier = 0.5;
            assert!(config.validate().is_err());
        }

        #[test]
        fn push_delay_order() {
            let mut config = StoreConfig::default();
            config.push.max_delay_ms = 10;
            assert!(config.validate().is_err());
        }

        #[test]
        fn author_must_be_named() {
            let mut config = StoreConfig::default();
            config.author.email = String::new();
            assert!(config.validate().is_err());
        }
    }

    mod token {
        use super::*;

        #[test]
        fn debug_is_redacted() {
            let token = PushToken::new("ghp_supersecret");
            assert_eq!(format!("{:?}", token), "PushToken(***)");
            let config = StoreConfig {
                push_token: Some(token),
                ..StoreConfig::default()
            };
            assert!(!format!("{:?}", config).contains("supersecret"));
        }
    }
}
