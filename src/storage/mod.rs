//! # Object Storage
//!
//! The pipeline only ever talks to storage through [`ObjectStore`]: a flat
//! namespace of `/`-separated object names with whole-object writes, ranged
//! reads and one atomic primitive, [`ObjectStore::put_if_absent`], which the
//! merge coordinator relies on for its at-most-once guarantee.
//!
//! Adapters:
//! - [`InMemoryObjectStore`] for tests and single-process runs
//! - [`FileSystemObjectStore`] rooted at a local directory
//! - [`NotifyingObjectStore`] wrapping either, emitting a
//!   [`StorageNotification`] on every successful write

pub mod filesystem;
pub mod memory;
pub mod notifying;
pub mod paths;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use filesystem::FileSystemObjectStore;
pub use memory::InMemoryObjectStore;
pub use notifying::{NotifyingObjectStore, StorageNotification};
pub use paths::{ArtifactKind, ArtifactPaths, BatchArtifact};

use crate::constants::JSON_CONTENT_TYPE;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("Object not found: {path}")]
    NotFound { path: String },

    #[error("Object already exists: {path}")]
    AlreadyExists { path: String },

    #[error("I/O error on '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn not_found<P: Into<String>>(path: P) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn io<P: Into<String>, E: std::fmt::Display>(path: P, error: E) -> Self {
        Self::Io {
            path: path.into(),
            reason: error.to_string(),
        }
    }

    pub fn backend<S: Into<String>>(message: S) -> Self {
        Self::Backend(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Result of a conditional create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Created,
    AlreadyExists,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>>;

    /// Read bytes `[start, end)`, clamped to the object size
    async fn get_range(&self, path: &str, start: u64, end: u64) -> StorageResult<Vec<u8>> {
        let data = self.get(path).await?;
        let len = data.len() as u64;
        let start = start.min(len) as usize;
        let end = end.clamp(start as u64, len) as usize;
        Ok(data[start..end].to_vec())
    }

    async fn size(&self, path: &str) -> StorageResult<u64> {
        Ok(self.get(path).await?.len() as u64)
    }

    /// Create or overwrite
    async fn put(&self, path: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()>;

    /// Atomic create-if-absent
    async fn put_if_absent(&self, path: &str, data: Vec<u8>) -> StorageResult<PutOutcome>;

    /// Remove an object; removing a missing object succeeds
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Object names starting with `prefix`, sorted
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// Read and deserialize a JSON object
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn ObjectStore,
    path: &str,
) -> StorageResult<T> {
    let data = store.get(path).await?;
    serde_json::from_slice(&data)
        .map_err(|e| StorageError::backend(format!("invalid JSON in '{path}': {e}")))
}

/// Serialize and write a JSON object
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn ObjectStore,
    path: &str,
    value: &T,
) -> StorageResult<()> {
    let data = serde_json::to_vec(value)
        .map_err(|e| StorageError::backend(format!("cannot encode '{path}': {e}")))?;
    store.put(path, data, JSON_CONTENT_TYPE).await
}

/// Reject names that could escape a store's root or collide with temp files
pub(crate) fn validate_object_name(path: &str) -> StorageResult<()> {
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.split('/').any(|segment| {
            segment.is_empty() || segment == "." || segment == ".." || segment.starts_with(".tmp-")
        });
    if invalid {
        return Err(StorageError::backend(format!("invalid object name '{path}'")));
    }
    Ok(())
}
