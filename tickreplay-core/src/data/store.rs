//! Durable key-value blob store.
//!
//! The tick cache and the trade ledger both persist through `BlobStore`, so
//! swapping the filesystem backend for another one does not touch call sites.
//!
//! Filesystem layout: `{root}/{blake3(key)}.blob`, plus an `index.json`
//! sidecar mapping hashes back to their keys for administration commands.
//! Writes are atomic (write to .tmp, rename into place).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Outcome of a skip-if-exists write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// A value already existed under the key and was left untouched.
    Skipped,
}

pub trait BlobStore {
    fn contains(&self, key: &str) -> Result<bool, StoreError>;

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write unconditionally, replacing any existing value.
    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Write only if the key is absent.
    fn put_if_absent(&mut self, key: &str, value: &[u8]) -> Result<WriteOutcome, StoreError> {
        if self.contains(key)? {
            return Ok(WriteOutcome::Skipped);
        }
        self.put(key, value)?;
        Ok(WriteOutcome::Written)
    }

    /// Remove a key. Returns whether anything was removed.
    fn remove(&mut self, key: &str) -> Result<bool, StoreError>;

    /// All keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// In-memory store, used in tests and when nothing should outlive the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: BTreeMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.blobs.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.blobs.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .blobs
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Filesystem-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

const INDEX_FILE: &str = "index.json";

impl FsBlobStore {
    /// Open a store, creating the root directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{blake3(key)}.blob`
    fn blob_path(&self, key: &str) -> PathBuf {
        let hash = blake3::hash(key.as_bytes()).to_hex();
        self.root.join(format!("{hash}.blob"))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn read_index(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read(&path).map_err(|e| StoreError::io(&path, e))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    fn write_index(&self, index: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(index)?;
        write_atomic(&self.index_path(), &json)
    }
}

impl BlobStore for FsBlobStore {
    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.blob_path(key).is_file())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.blob_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|e| StoreError::io(&path, e))
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let path = self.blob_path(key);
        write_atomic(&path, value)?;

        // Index maps file name -> key
        let mut index = self.read_index()?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if index.get(&file_name).map(String::as_str) != Some(key) {
            index.insert(file_name, key.to_string());
            self.write_index(&index)?;
        }
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool, StoreError> {
        let path = self.blob_path(key);
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|e| StoreError::io(&path, e))?;

        let mut index = self.read_index()?;
        if let Some(name) = path.file_name() {
            index.remove(name.to_string_lossy().as_ref());
            self.write_index(&index)?;
        }
        Ok(true)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let index = self.read_index()?;
        let mut keys: Vec<String> = index
            .into_iter()
            .filter(|(name, key)| key.starts_with(prefix) && self.root.join(name).is_file())
            .map(|(_, key)| key)
            .collect();
        keys.sort();
        Ok(keys)
    }
}

/// Serialize a value as a JSON blob.
pub fn to_blob<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserialize a JSON blob.
pub fn from_blob<T: for<'de> Deserialize<'de>>(blob: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(blob)?)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes).map_err(|e| StoreError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::io(path, e)
    })
}
