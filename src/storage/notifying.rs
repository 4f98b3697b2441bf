//! Store wrapper that reports every successful write on a channel.

use super::{ObjectStore, PutOutcome, StorageResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Storage-change notification: which object in which bucket was written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageNotification {
    pub bucket: String,
    #[serde(alias = "name")]
    pub object_name: String,
}

impl StorageNotification {
    pub fn new<B: Into<String>, N: Into<String>>(bucket: B, object_name: N) -> Self {
        Self {
            bucket: bucket.into(),
            object_name: object_name.into(),
        }
    }
}

#[derive(Debug)]
pub struct NotifyingObjectStore<S> {
    inner: S,
    bucket: String,
    sender: mpsc::UnboundedSender<StorageNotification>,
}

impl<S: ObjectStore> NotifyingObjectStore<S> {
    /// Wrap `inner`; the receiver yields one notification per successful write
    pub fn new<B: Into<String>>(
        inner: S,
        bucket: B,
    ) -> (Self, mpsc::UnboundedReceiver<StorageNotification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                inner,
                bucket: bucket.into(),
                sender,
            },
            receiver,
        )
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn notify(&self, path: &str) {
        let notification = StorageNotification::new(self.bucket.clone(), path);
        if self.sender.send(notification).is_err() {
            debug!(object = %path, "Notification receiver dropped; write not announced");
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for NotifyingObjectStore<S> {
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
        self.notify(path);
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, data: Vec<u8>) -> StorageResult<PutOutcome> {
        let outcome = self.inner.put_if_absent(path, data).await?;
        if outcome == PutOutcome::Created {
            self.notify(path);
        }
        Ok(outcome)
    }

    async fn delete(&self, path: &str) -> StorageResult<()> {
        self.inner.delete(path).await
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.inner.list(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryObjectStore;

    #[tokio::test]
    async fn test_writes_are_announced() {
        let (store, mut rx) = NotifyingObjectStore::new(InMemoryObjectStore::new(), "bucket");

        store.put("a/1", Vec::new(), "").await.unwrap();
        assert_eq!(store.put_if_absent("a/2", Vec::new()).await.unwrap(), PutOutcome::Created);
        assert_eq!(
            store.put_if_absent("a/2", Vec::new()).await.unwrap(),
            PutOutcome::AlreadyExists
        );
        store.delete("a/1").await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), StorageNotification::new("bucket", "a/1"));
        assert_eq!(rx.recv().await.unwrap(), StorageNotification::new("bucket", "a/2"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_notification_accepts_name_alias() {
        let n: StorageNotification =
            serde_json::from_str(r#"{"bucket":"b","name":"batch_results/x_result_0.jsonl"}"#)
                .unwrap();
        assert_eq!(n.object_name, "batch_results/x_result_0.jsonl");
    }
}
