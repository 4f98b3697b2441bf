//! In-process object store backed by a concurrent map.
//!
//! ```rust
//! use triage_core::storage::{InMemoryObjectStore, ObjectStore, PutOutcome};
//!
//! # tokio_test::block_on(async {
//! let store = InMemoryObjectStore::new();
//! let first = store.put_if_absent("locks/alerts.lock", b"held".to_vec()).await.unwrap();
//! let second = store.put_if_absent("locks/alerts.lock", b"held".to_vec()).await.unwrap();
//! assert_eq!(first, PutOutcome::Created);
//! assert_eq!(second, PutOutcome::AlreadyExists);
//! # });
//! ```

use super::{validate_object_name, ObjectStore, PutOutcome, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<String, StoredObject>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn content_type(&self, path: &str) -> Option<String> {
        self.objects.get(path).map(|o| o.content_type.clone())
    }

    pub fn updated_at(&self, path: &str) -> Option<DateTime<Utc>> {
        self.objects.get(path).map(|o| o.updated_at)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        Ok(self.objects.contains_key(path))
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::not_found(path))
    }

    async fn get_range(&self, path: &str, start: u64, end: u64) -> StorageResult<Vec<u8>> {
        let object = self
            .objects
            .get(path)
            .ok_or_else(|| StorageError::not_found(path))?;
        let len = object.data.len() as u64;
        let start = start.min(len) as usize;
        let end = end.clamp(start as u64, len) as usize;
        Ok(object.data[start..end].to_vec())
    }

    async fn size(&self, path: &str) -> StorageResult<u64> {
        self.objects
            .get(path)
            .map(|o| o.data.len() as u64)
            .ok_or_else(|| StorageError::not_found(path))
    }

    async fn put(&self, path: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        validate_object_name(path)?;
        self.objects.insert(
            path.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, data: Vec<u8>) -> StorageResult<PutOutcome> {
        validate_object_name(path)?;
        match self.objects.entry(path.to_string()) {
            Entry::Occupied(_) => Ok(PutOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(StoredObject {
                    data,
                    content_type: crate::constants::JSON_CONTENT_TYPE.to_string(),
                    updated_at: Utc::now(),
                });
                Ok(PutOutcome::Created)
            }
        }
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.objects.remove(path);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
