//! String key-value stores the board is persisted into.
//!
//! Get and set a string by key, with a total byte quota and no transactions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::lock::{LockError, StoreLock};
use crate::io::recovery::atomic_write;

/// Error type for store access
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("writing {key} would use {size} bytes, over the {limit}-byte quota")]
    QuotaExceeded {
        key: String,
        size: usize,
        limit: usize,
    },
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store file {path} is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
}

/// A string-valued key-value store with a size limit
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// Bytes an entry set occupies against the quota
fn usage<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> usize {
    entries.map(|(k, v)| k.len() + v.len()).sum()
}

fn check_quota(
    entries: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    limit: usize,
) -> Result<(), StoreError> {
    let others = usage(entries.iter().filter(|(k, _)| k.as_str() != key));
    let size = others + key.len() + value.len();
    if size > limit {
        return Err(StoreError::QuotaExceeded {
            key: key.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// Where an unreadable store file is moved before it is rewritten.
/// An older backup is replaced.
pub fn corrupt_backup_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "store".into());
    name.push(".corrupt");
    path.with_file_name(name)
}

/// In-process store, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        MemoryStore {
            entries: BTreeMap::new(),
            quota: Some(quota),
        }
    }

    /// Seed a value without quota checks
    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn bytes_used(&self) -> usize {
        usage(self.entries.iter())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(limit) = self.quota {
            check_quota(&self.entries, key, value, limit)?;
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by one JSON file holding `{ "key": "value", ... }`.
///
/// Writes take a [`StoreLock`], re-read the file, and replace it atomically.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    quota: usize,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>, quota: usize) -> Self {
        FileStore {
            path: path.into(),
            quota,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(StoreError::ReadError {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let _lock = StoreLock::acquire_default(&self.path)?;
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(StoreError::Corrupt { path, source }) => {
                let backup = corrupt_backup_path(&path);
                fs::rename(&path, &backup).map_err(|e| StoreError::WriteError {
                    path: backup.clone(),
                    source: e,
                })?;
                log::warn!(
                    "store file {} is unreadable ({}); moved it to {}",
                    path.display(),
                    source,
                    backup.display()
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        check_quota(&entries, key, value, self.quota)?;
        entries.insert(key.to_string(), value.to_string());

        let content = serde_json::to_string_pretty(&entries).map_err(|e| StoreError::Corrupt {
            path: self.path.clone(),
            source: e,
        })?;
        atomic_write(&self.path, content.as_bytes()).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }
}
