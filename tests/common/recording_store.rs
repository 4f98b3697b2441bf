//! Object store wrapper counting writes per object.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use triage_core::storage::{ObjectStore, PutOutcome, StorageResult};

#[derive(Debug, Default)]
struct WriteCounts {
    puts: HashMap<String, usize>,
    conditional_created: HashMap<String, usize>,
    conditional_rejected: HashMap<String, usize>,
}

pub struct RecordingObjectStore {
    inner: Arc<dyn ObjectStore>,
    counts: Mutex<WriteCounts>,
}

impl RecordingObjectStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self {
            inner,
            counts: Mutex::new(WriteCounts::default()),
        }
    }

    pub fn puts(&self, path: &str) -> usize {
        self.counts.lock().puts.get(path).copied().unwrap_or(0)
    }

    pub fn conditional_creates(&self, path: &str) -> usize {
        self.counts
            .lock()
            .conditional_created
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn conditional_rejections(&self, path: &str) -> usize {
        self.counts
            .lock()
            .conditional_rejected
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        self.inner.exists(path).await
    }

    async fn get(&self, path: &str) -> StorageResult<Vec<u8>> {
        self.inner.get(path).await
    }

    async fn get_range(&self, path: &str, start: u64, end: u64) -> StorageResult<Vec<u8>> {
        self.inner.get_range(path, start, end).await
    }

    async fn size(&self, path: &str) -> StorageResult<u64> {
        self.inner.size(path).await
    }

    async fn put(&self, path: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        self.inner.put(path, data, content_type).await?;
        *self.counts.lock().puts.entry(path.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, data: Vec<u8>) -> StorageResult<PutOutcome> {
        let outcome = self.inner.put_if_absent(path, data).await?;
        let mut counts = self.counts.lock();
        let bucket = match outcome {
            PutOutcome::Created => &mut counts.conditional_created,
            PutOutcome::AlreadyExists => &mut counts.conditional_rejected,
        };
        *bucket.entry(path.to_string()).or_insert(0) += 1;
        Ok(outcome)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.inner.delete(path).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}
