//! Durable local key/value storage for the current subject.
//!
//! The file-backed store keeps all keys in a single JSON document wrapped in an
//! envelope with a SHA-256 checksum. A file that fails the integrity check is
//! treated as empty (the subject must log in again) instead of being trusted.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

/// Current version of the storage file format.
pub const STORAGE_VERSION: u32 = 1;

/// Errors raised by durable storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error for {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A value could not be (de)serialized.
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The in-process lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Synchronous key/value storage that survives restarts.
pub trait DurableStorage: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Delete a value. Returns `true` if it existed.
    fn remove(&self, key: &str) -> Result<bool, StorageError>;
}

/// Volatile storage, used by tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }
}

/// Checksummed document persisted by [`FileStorage`].
#[derive(Debug, Serialize, Deserialize)]
struct StorageEnvelope {
    /// SHA256 checksum of the compact-serialized document.
    checksum: String,
    /// The stored data.
    document: StorageDocument,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StorageDocument {
    version: u32,
    entries: BTreeMap<String, String>,
}

impl StorageDocument {
    fn checksum(&self) -> Result<String, StorageError> {
        // Compact form, must match between write and verify
        let json = serde_json::to_string(self)?;
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// JSON file storage with an integrity checksum.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStorage {
    /// Use (or later create) the storage file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_document(&self) -> Result<StorageDocument, StorageError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StorageDocument::default())
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let envelope: StorageEnvelope = match serde_json::from_str(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                log::warn!(
                    "Storage file {} is unreadable, starting empty: {}",
                    self.path.display(),
                    e
                );
                return Ok(StorageDocument::default());
            }
        };

        if envelope.document.checksum()? != envelope.checksum {
            log::warn!(
                "Storage file {} failed its integrity check, starting empty",
                self.path.display()
            );
            return Ok(StorageDocument::default());
        }

        if envelope.document.version != STORAGE_VERSION {
            log::warn!(
                "Unsupported storage version {} in {}, starting empty",
                envelope.document.version,
                self.path.display()
            );
            return Ok(StorageDocument::default());
        }

        Ok(envelope.document)
    }

    fn write_document(&self, document: StorageDocument) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let envelope = StorageEnvelope {
            checksum: document.checksum()?,
            document,
        };
        let json = serde_json::to_string_pretty(&envelope)?;

        // Write then rename
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_document()?.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut document = self.read_document()?;
        document.version = STORAGE_VERSION;
        document.entries.insert(key.to_string(), value.to_string());
        self.write_document(document)
    }

    fn remove(&self, key: &str) -> Result<bool, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let mut document = self.read_document()?;
        let removed = document.entries.remove(key).is_some();
        if removed {
            document.version = STORAGE_VERSION;
            self.write_document(document)?;
        }
        Ok(removed)
    }
}
