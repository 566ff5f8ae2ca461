//! core::node_path
//!
//! Logical node paths and the validator that produces them.
//!
//! # Rules
//!
//! A raw path is normalized before it is checked:
//! - surrounding whitespace is trimmed
//! - backslashes become `/`
//! - runs of `/` collapse to one
//! - `.md` is appended when missing
//!
//! It is then rejected if it:
//! - is empty
//! - contains NUL or any ASCII control character
//! - is absolute (`/x`, `\x`) or carries a drive or scheme prefix (`C:`, `file:`)
//! - ends with `/`
//! - has a `.` segment or any segment containing `..`
//! - has a segment starting with `.git`
//! - has a reserved device name as a segment stem (`CON`, `NUL`, `COM1`, ...)
//! - exceeds the byte length or segment count limits
//!
//! The result is a relative, forward-slash path that always resolves inside
//! the storage root. [`NodePath`] can only be built by [`PathValidator`], so
//! holding one is proof that the path was sanitized.
//!
//! # Example
//!
//! ```
//! use memvault::core::node_path::PathValidator;
//!
//! let validator = PathValidator::default();
//! let path = validator.sanitize("concepts\\rust//ownership").unwrap();
//! assert_eq!(path.as_str(), "concepts/rust/ownership.md");
//!
//! assert!(validator.sanitize("../etc/passwd").is_err());
//! assert!(validator.sanitize("/abs.md").is_err());
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix every node path carries.
pub const NODE_SUFFIX: &str = ".md";

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Errors from path validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path cannot be empty")]
    Empty,

    #[error("path contains control characters")]
    ControlCharacter,

    #[error("path must be relative: {0}")]
    Absolute(String),

    #[error("path has a drive or scheme prefix: {0}")]
    Prefix(String),

    #[error("path must name a node, not a directory: {0}")]
    TrailingSeparator(String),

    #[error("path contains a '.' segment or '..': {0}")]
    Traversal(String),

    #[error("path segment is reserved: {0}")]
    Reserved(String),

    #[error("path has an empty file name: {0}")]
    EmptyName(String),

    #[error("path is not in canonical form: {0}")]
    NotCanonical(String),

    #[error("path too long ({len} bytes, max {max})")]
    TooLong { len: usize, max: usize },

    #[error("path too deep ({count} segments, max {max})")]
    TooDeep { count: usize, max: usize },
}

/// Length limits applied by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLimits {
    pub max_path_bytes: usize,
    pub max_segments: usize,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self {
            max_path_bytes: 1024,
            max_segments: 32,
        }
    }
}

/// A sanitized node path, relative to the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath(String);

impl NodePath {
    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve to a filesystem path under `root`.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }

    /// Path segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The final segment (file name).
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The directory portion, or `None` for top-level nodes.
    pub fn parent_dir(&self) -> Option<&str> {
        self.0.rsplit_once('/').map(|(dir, _)| dir)
    }

    /// Whether this path lies under the directory `prefix`.
    ///
    /// An empty prefix matches everything.
    pub fn is_under(&self, prefix: &str) -> bool {
        prefix.is_empty()
            || self
                .0
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl TryFrom<String> for NodePath {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let path = PathValidator::default().sanitize(&s)?;
        if path.0 != s {
            return Err(PathError::NotCanonical(s));
        }
        Ok(path)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.0
    }
}

impl AsRef<str> for NodePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalizes and validates logical paths.
///
/// Every read and mutation runs its path through `sanitize` before touching
/// the filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathValidator {
    limits: PathLimits,
}

impl PathValidator {
    pub fn new(limits: PathLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> PathLimits {
        self.limits
    }

    /// Sanitize a raw node path.
    ///
    /// `sanitize(sanitize(p)) == sanitize(p)` for every accepted input.
    ///
    /// # Errors
    ///
    /// Returns a [`PathError`] describing the first rule the path breaks.
    pub fn sanitize(&self, raw: &str) -> Result<NodePath, PathError> {
        let segments = self.normalize(raw, false)?;

        let mut joined = segments.join("/");
        if !joined.ends_with(NODE_SUFFIX) {
            joined.push_str(NODE_SUFFIX);
        }
        if joined.rsplit('/').next() == Some(NODE_SUFFIX) {
            return Err(PathError::EmptyName(raw.to_string()));
        }

        self.check_limits(&joined, segments.len())?;
        Ok(NodePath(joined))
    }

    /// Sanitize a listing prefix (a directory, not a node).
    ///
    /// An empty or whitespace-only prefix means the storage root and yields
    /// an empty string. A trailing `/` is allowed and dropped.
    pub fn sanitize_prefix(&self, raw: &str) -> Result<String, PathError> {
        if raw.chars().any(|c| c.is_ascii_control()) {
            return Err(PathError::ControlCharacter);
        }
        if raw.trim().is_empty() {
            return Ok(String::new());
        }
        let segments = self.normalize(raw, true)?;
        let joined = segments.join("/");
        self.check_limits(&joined, segments.len())?;
        Ok(joined)
    }

    fn normalize<'a>(&self, raw: &'a str, allow_trailing: bool) -> Result<Vec<&'a str>, PathError> {
        if raw.chars().any(|c| c.is_ascii_control()) {
            return Err(PathError::ControlCharacter);
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        if trimmed.starts_with('/') || trimmed.starts_with('\\') {
            return Err(PathError::Absolute(raw.to_string()));
        }
        if !allow_trailing && (trimmed.ends_with('/') || trimmed.ends_with('\\')) {
            return Err(PathError::TrailingSeparator(raw.to_string()));
        }

        let segments: Vec<&str> = trimmed
            .split(['/', '\\'])
            .filter(|seg| !seg.is_empty())
            .collect();

        if segments.first().is_some_and(|first| first.contains(':')) {
            return Err(PathError::Prefix(raw.to_string()));
        }

        for seg in &segments {
            if *seg == "." || seg.contains("..") {
                return Err(PathError::Traversal(raw.to_string()));
            }
            if seg.starts_with(".git") {
                return Err(PathError::Reserved(seg.to_string()));
            }
            let stem = seg.split('.').next().unwrap_or(seg).trim();
            if RESERVED_NAMES
                .iter()
                .any(|name| name.eq_ignore_ascii_case(stem))
            {
                return Err(PathError::Reserved(seg.to_string()));
            }
        }

        Ok(segments)
    }

    fn check_limits(&self, joined: &str, segments: usize) -> Result<(), PathError> {
        if joined.len() > self.limits.max_path_bytes {
            return Err(PathError::TooLong {
                len: joined.len(),
                max: self.limits.max_path_bytes,
            });
        }
        if segments > self.limits.max_segments {
            return Err(PathError::TooDeep {
                count: segments,
                max: self.limits.max_segments,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(raw: &str) -> Result<NodePath, PathError> {
        PathValidator::default().sanitize(raw)
    }

    mod accepted {
        use super::*;

        #[test]
        fn plain_relative_path() {
            assert_eq!(sanitize("concepts/a.md").unwrap().as_str(), "concepts/a.md");
        }

        #[test]
        fn appends_suffix() {
            assert_eq!(sanitize("concepts/a").unwrap().as_str(), "concepts/a.md");
        }

        #[test]
        fn collapses_separators() {
            assert_eq!(sanitize("a//b///c.md").unwrap().as_str(), "a/b/c.md");
        }

        #[test]
        fn converts_backslashes() {
            assert_eq!(sanitize("a\\b\\c").unwrap().as_str(), "a/b/c.md");
        }

        #[test]
        fn trims_whitespace() {
            assert_eq!(sanitize("  notes/x.md ").unwrap().as_str(), "notes/x.md");
        }

        #[test]
        fn dotfiles_other_than_git_allowed() {
            assert!(sanitize("notes/.hidden.md").is_ok());
        }

        #[test]
        fn is_idempotent() {
            for raw in ["a", "a/b", "x\\y//z.md", " q.md"] {
                let once = sanitize(raw).unwrap();
                let twice = sanitize(once.as_str()).unwrap();
                assert_eq!(once, twice);
            }
        }
    }

    mod rejected {
        use super::*;

        #[test]
        fn empty() {
            assert_eq!(sanitize(""), Err(PathError::Empty));
            assert_eq!(sanitize("   "), Err(PathError::Empty));
        }

        #[test]
        fn traversal() {
            assert!(matches!(sanitize("../x.md"), Err(PathError::Traversal(_))));
            assert!(matches!(sanitize("a/../../x"), Err(PathError::Traversal(_))));
            assert!(matches!(sanitize("a/./x"), Err(PathError::Traversal(_))));
            assert!(matches!(sanitize("a\\..\\x"), Err(PathError::Traversal(_))));
            assert!(matches!(sanitize("a/b..c"), Err(PathError::Traversal(_))));
        }

        #[test]
        fn absolute() {
            assert!(matches!(sanitize("/etc/passwd"), Err(PathError::Absolute(_))));
            assert!(matches!(sanitize("\\server\\x"), Err(PathError::Absolute(_))));
        }

        #[test]
        fn drive_and_scheme_prefixes() {
            assert!(matches!(sanitize("C:/x.md"), Err(PathError::Prefix(_))));
            assert!(matches!(sanitize("c:x.md"), Err(PathError::Prefix(_))));
            assert!(matches!(sanitize("file://x"), Err(PathError::Prefix(_))));
            assert!(matches!(sanitize("https:/x"), Err(PathError::Prefix(_))));
        }

        #[test]
        fn control_characters() {
            assert_eq!(sanitize("a\0b.md"), Err(PathError::ControlCharacter));
            assert_eq!(sanitize("a\nb.md"), Err(PathError::ControlCharacter));
            assert_eq!(sanitize("a\x7f.md"), Err(PathError::ControlCharacter));
            assert_eq!(sanitize("\ta.md"), Err(PathError::ControlCharacter));
        }

        #[test]
        fn trailing_separator() {
            assert!(matches!(sanitize("notes/"), Err(PathError::TrailingSeparator(_))));
        }

        #[test]
        fn git_metadata() {
            assert!(matches!(sanitize(".git/config"), Err(PathError::Reserved(_))));
            assert!(matches!(sanitize("a/.gitignore"), Err(PathError::Reserved(_))));
        }

        #[test]
        fn reserved_device_names() {
            assert!(matches!(sanitize("con.md"), Err(PathError::Reserved(_))));
            assert!(matches!(sanitize("a/LPT1/x.md"), Err(PathError::Reserved(_))));
            assert!(sanitize("console.md").is_ok());
        }

        #[test]
        fn empty_name() {
            assert!(matches!(sanitize(".md"), Err(PathError::EmptyName(_))));
            assert!(matches!(sanitize("a/.md"), Err(PathError::EmptyName(_))));
        }

        #[test]
        fn too_long() {
            let long = "a".repeat(1100);
            assert!(matches!(sanitize(&long), Err(PathError::TooLong { .. })));
        }

        #[test]
        fn too_deep() {
            let validator = PathValidator::new(PathLimits {
                max_path_bytes: 1024,
                max_segments: 3,
            });
            assert!(validator.sanitize("a/b/c").is_ok());
            assert!(matches!(
                validator.sanitize("a/b/c/d"),
                Err(PathError::TooDeep { count: 4, max: 3 })
            ));
        }
    }

    mod node_path {
        use super::*;

        #[test]
        fn resolve_stays_under_root() {
            let root = Path::new("/srv/memory");
            let path = sanitize("a/b/c").unwrap();
            let resolved = path.resolve(root);
            assert_eq!(resolved, PathBuf::from("/srv/memory/a/b/c.md"));
            assert!(resolved.starts_with(root));
        }

        #[test]
        fn parent_and_file_name() {
            let path = sanitize("a/b/c").unwrap();
            assert_eq!(path.parent_dir(), Some("a/b"));
            assert_eq!(path.file_name(), "c.md");
            assert_eq!(sanitize("top").unwrap().parent_dir(), None);
        }

        #[test]
        fn is_under_prefix() {
            let path = sanitize("concepts/rust/a").unwrap();
            assert!(path.is_under(""));
            assert!(path.is_under("concepts"));
            assert!(path.is_under("concepts/rust"));
            assert!(!path.is_under("concept"));
            assert!(!path.is_under("concepts/rust/a.md"));
        }

        #[test]
        fn serde_rejects_non_canonical() {
            let ok: NodePath = serde_json::from_str("\"a/b.md\"").unwrap();
            assert_eq!(ok.as_str(), "a/b.md");
            assert!(serde_json::from_str::<NodePath>("\"a//b\"").is_err());
            assert!(serde_json::from_str::<NodePath>("\"../b.md\"").is_err());
        }
    }

    mod prefix {
        use super::*;

        #[test]
        fn empty_prefix_is_root() {
            assert_eq!(PathValidator::default().sanitize_prefix("").unwrap(), "");
            assert_eq!(PathValidator::default().sanitize_prefix("  ").unwrap(), "");
        }

        #[test]
        fn trailing_slash_dropped() {
            assert_eq!(
                PathValidator::default().sanitize_prefix("concepts/rust/").unwrap(),
                "concepts/rust"
            );
        }

        #[test]
        fn traversal_rejected() {
            assert!(PathValidator::default().sanitize_prefix("../up").is_err());
            assert!(PathValidator::default().sanitize_prefix("/abs").is_err());
        }
    }
}
