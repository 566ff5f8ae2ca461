//! store
//!
//! Durable storage of memory nodes as markdown files.
//!
//! # Architecture
//!
//! The content store is the only code that touches node files in the
//! working tree. It knows nothing about git: the write coordinator stages
//! files through it and then hands the paths to the git manager.
//!
//! # Invariants
//!
//! - Every path is a [`NodePath`], so every file lives inside `root`
//! - Writes are atomic: temp file in the target directory, fsync, rename
//! - Deleting a node prunes directories it leaves empty, never `root` itself
//! - Temp files (`.<name>.<uuid>.tmp`) are never listed as nodes
//!
//! # Example
//!
//! ```
//! use memvault::core::node_path::PathValidator;
//! use memvault::store::ContentStore;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = ContentStore::new(dir.path(), PathValidator::default(), 1024);
//! let path = store.validator().sanitize("notes/today").unwrap();
//!
//! store.write(&path, "# Today\n").unwrap();
//! let (content, stat) = store.read(&path).unwrap();
//! assert_eq!(content, "# Today\n");
//! assert_eq!(stat.size, 8);
//! ```

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::core::node_path::{NodePath, PathValidator, NODE_SUFFIX};

/// Errors from content store operations.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("node not found: {0}")]
    NotFound(NodePath),

    #[error("content too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("content cannot be empty or whitespace-only")]
    Empty,

    #[error("node is not valid UTF-8: {0}")]
    InvalidUtf8(NodePath),

    #[error("i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ContentError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        ContentError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Filesystem facts about a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    /// Creation time where the filesystem records one, else modification time.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileStat {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        let updated_at = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        let created_at = meta
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(updated_at);
        Self {
            size: meta.len(),
            created_at,
            updated_at,
        }
    }
}

/// Markdown node storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
    validator: PathValidator,
    max_content_bytes: usize,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>, validator: PathValidator, max_content_bytes: usize) -> Self {
        Self {
            root: root.into(),
            validator,
            max_content_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn validator(&self) -> &PathValidator {
        &self.validator
    }

    pub fn max_content_bytes(&self) -> usize {
        self.max_content_bytes
    }

    /// Check content limits before any mutation.
    pub fn validate_content(&self, content: &str) -> Result<(), ContentError> {
        if content.len() > self.max_content_bytes {
            return Err(ContentError::TooLarge {
                size: content.len(),
                max: self.max_content_bytes,
            });
        }
        if content.trim().is_empty() {
            return Err(ContentError::Empty);
        }
        Ok(())
    }

    /// Read a node's content and file facts.
    pub fn read(&self, path: &NodePath) -> Result<(String, FileStat), ContentError> {
        let full = path.resolve(&self.root);
        let bytes = match fs::read(&full) {
            Ok(bytes) => bytes,
            Err(e) if is_missing(&e) => return Err(ContentError::NotFound(path.clone())),
            Err(e) => return Err(ContentError::io(&full, e)),
        };
        let meta = fs::metadata(&full).map_err(|e| ContentError::io(&full, e))?;
        let content =
            String::from_utf8(bytes).map_err(|_| ContentError::InvalidUtf8(path.clone()))?;
        Ok((content, FileStat::from_metadata(&meta)))
    }

    /// Raw bytes of a node, or `None` when it does not exist.
    pub fn read_bytes(&self, path: &NodePath) -> Result<Option<Vec<u8>>, ContentError> {
        let full = path.resolve(&self.root);
        match fs::read(&full) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(ContentError::io(&full, e)),
        }
    }

    /// Validate and atomically write a node. Returns the size written.
    pub fn write(&self, path: &NodePath, content: &str) -> Result<u64, ContentError> {
        self.validate_content(content)?;
        self.write_bytes(path, content.as_bytes())
    }

    /// Atomically write raw bytes without content validation.
    ///
    /// Used by rollback to put back exactly what HEAD holds.
    pub fn write_bytes(&self, path: &NodePath, data: &[u8]) -> Result<u64, ContentError> {
        let full = path.resolve(&self.root);
        let dir = full
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir).map_err(|e| ContentError::io(&dir, e))?;

        let tmp = dir.join(format!(".{}.{}.tmp", path.file_name(), Uuid::new_v4()));
        if let Err(e) = write_atomic(&tmp, &full, data) {
            let _ = fs::remove_file(&tmp);
            return Err(ContentError::io(&full, e));
        }
        debug!(path = %path, bytes = data.len(), "stored node");
        Ok(data.len() as u64)
    }

    /// Delete a node and prune directories it leaves empty.
    pub fn delete(&self, path: &NodePath) -> Result<(), ContentError> {
        if self.remove_if_exists(path)? {
            Ok(())
        } else {
            Err(ContentError::NotFound(path.clone()))
        }
    }

    /// Delete a node if present. Returns whether a file was removed.
    pub fn remove_if_exists(&self, path: &NodePath) -> Result<bool, ContentError> {
        let full = path.resolve(&self.root);
        match fs::remove_file(&full) {
            Ok(()) => {
                self.prune_empty_dirs(&full);
                debug!(path = %path, "removed node");
                Ok(true)
            }
            Err(e) if is_missing(&e) => Ok(false),
            Err(e) => Err(ContentError::io(&full, e)),
        }
    }

    pub fn exists(&self, path: &NodePath) -> bool {
        path.resolve(&self.root).is_file()
    }

    pub fn stat(&self, path: &NodePath) -> Result<FileStat, ContentError> {
        let full = path.resolve(&self.root);
        match fs::metadata(&full) {
            Ok(meta) if meta.is_file() => Ok(FileStat::from_metadata(&meta)),
            Ok(_) => Err(ContentError::NotFound(path.clone())),
            Err(e) if is_missing(&e) => Err(ContentError::NotFound(path.clone())),
            Err(e) => Err(ContentError::io(&full, e)),
        }
    }

    /// List nodes under a sanitized `prefix`, sorted by path.
    ///
    /// With `recursive == false` only nodes directly inside the prefix
    /// directory are returned. Files whose relative path is not a canonical
    /// node path (temp files, non-markdown files, `.git*`) are skipped.
    pub fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<NodePath>, ContentError> {
        let base = prefix
            .split('/')
            .filter(|s| !s.is_empty())
            .fold(self.root.clone(), |acc, seg| acc.join(seg));
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut walker = WalkDir::new(&base).min_depth(1);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut nodes = Vec::new();
        let entries = walker.into_iter().filter_entry(|entry| {
            !entry.file_name().to_string_lossy().starts_with(".git")
        });
        for entry in entries {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| base.clone());
                ContentError::Io {
                    path,
                    source: e.into(),
                }
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let rel = rel.to_string_lossy().replace('\\', "/");
            if !rel.ends_with(NODE_SUFFIX) {
                continue;
            }
            match self.validator.sanitize(&rel) {
                Ok(node) if node.as_str() == rel => nodes.push(node),
                _ => continue,
            }
        }
        nodes.sort();
        Ok(nodes)
    }

    /// Immediate subdirectories of `prefix` holding at least one node,
    /// as root-relative `dir/` strings, sorted.
    pub fn subdirectories(&self, prefix: &str) -> Result<Vec<String>, ContentError> {
        let base = if prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", prefix)
        };
        let mut dirs = BTreeSet::new();
        for node in self.list(prefix, true)? {
            let Some(rest) = node.as_str().strip_prefix(base.as_str()) else {
                continue;
            };
            if let Some((dir, _)) = rest.split_once('/') {
                dirs.insert(format!("{}{}/", base, dir));
            }
        }
        Ok(dirs.into_iter().collect())
    }

    /// Remove empty directories from `file`'s parent up to, not including,
    /// the root.
    fn prune_empty_dirs(&self, file: &Path) {
        let mut current = file.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            // Fails on non-empty directories, which ends the walk.
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

fn is_missing(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::NotFound
}

fn write_atomic(tmp: &Path, final_path: &Path, data: &[u8]) -> std::io::Result<()> {
    {
        let mut f = File::create(tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }
    fs::rename(tmp, final_path)?;
    if let Some(dir) = final_path.parent() {
        File::open(dir)?.sync_all()?;
    }
    Ok(())
}
