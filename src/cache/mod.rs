//! # Classification Cache
//!
//! Content-addressed cache of classification verdicts, one object per record
//! hash under the cache namespace. Entries expire after `max_age`: expired
//! entries read as misses and are removed by [`ClassificationCache::sweep_expired`].
//!
//! A disabled cache behaves like a no-op provider: every read misses and every
//! write succeeds without touching storage.

use crate::config::CacheConfig;
use crate::models::{Classification, ThreatClass};
use crate::storage::{get_json, put_json, ArtifactPaths, ObjectStore, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stored value for one record hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub last_modified: DateTime<Utc>,
    pub class: ThreatClass,
    pub explanation: String,
}

impl CacheEntry {
    pub fn new(classification: &Classification) -> Self {
        Self {
            last_modified: Utc::now(),
            class: classification.class,
            explanation: classification.explanation.clone(),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match chrono::Duration::from_std(max_age) {
            Ok(max_age) => now.signed_duration_since(self.last_modified) > max_age,
            Err(_) => false,
        }
    }

    pub fn classification(&self) -> Classification {
        Classification {
            class: self.class,
            explanation: self.explanation.clone(),
        }
    }
}

/// Outcome of an age-based sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub unreadable: usize,
}

pub struct ClassificationCache {
    store: Arc<dyn ObjectStore>,
    paths: ArtifactPaths,
    max_age: Duration,
    enabled: bool,
}

impl std::fmt::Debug for ClassificationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassificationCache")
            .field("max_age", &self.max_age)
            .field("enabled", &self.enabled)
            .finish()
    }
}

impl ClassificationCache {
    pub fn new(store: Arc<dyn ObjectStore>, paths: ArtifactPaths, config: &CacheConfig) -> Self {
        Self {
            store,
            paths,
            max_age: config.max_age(),
            enabled: config.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fresh entry for `record_hash`, if any
    pub async fn get(&self, record_hash: &str) -> StorageResult<Option<CacheEntry>> {
        if !self.enabled {
            return Ok(None);
        }
        let path = self.paths.cache_entry(record_hash);
        match get_json::<CacheEntry>(self.store.as_ref(), &path).await {
            Ok(entry) if entry.is_expired_at(Utc::now(), self.max_age) => {
                debug!(record_hash = %record_hash, "Cache entry expired");
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write or overwrite the entry for `record_hash`
    pub async fn put(&self, record_hash: &str, classification: &Classification) -> StorageResult<()> {
        self.put_entry(record_hash, &CacheEntry::new(classification))
            .await
    }

    pub async fn put_entry(&self, record_hash: &str, entry: &CacheEntry) -> StorageResult<()> {
        if !self.enabled {
            return Ok(());
        }
        put_json(self.store.as_ref(), &self.paths.cache_entry(record_hash), entry).await
    }

    pub async fn len(&self) -> StorageResult<usize> {
        if !self.enabled {
            return Ok(0);
        }
        Ok(self.store.list(&self.paths.cache_prefix()).await?.len())
    }

    pub async fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn sweep_expired(&self) -> StorageResult<SweepReport> {
        self.sweep_expired_at(Utc::now()).await
    }

    /// Delete every entry older than `max_age` relative to `now`
    pub async fn sweep_expired_at(&self, now: DateTime<Utc>) -> StorageResult<SweepReport> {
        let mut report = SweepReport::default();
        if !self.enabled {
            return Ok(report);
        }

        for name in self.store.list(&self.paths.cache_prefix()).await? {
            report.scanned += 1;
            match get_json::<CacheEntry>(self.store.as_ref(), &name).await {
                Ok(entry) if entry.is_expired_at(now, self.max_age) => {
                    self.store.delete(&name).await?;
                    report.removed += 1;
                }
                Ok(_) => {}
                // Deleted concurrently by another sweep
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(object = %name, error = %e, "Skipping unreadable cache entry");
                    report.unreadable += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            removed = report.removed,
            unreadable = report.unreadable,
            "🧹 CACHE: Sweep complete"
        );
        Ok(report)
    }

    /// Sweep only when the entry count exceeds `threshold`
    pub async fn sweep_if_over(&self, threshold: usize) -> StorageResult<Option<SweepReport>> {
        let count = self.len().await?;
        if count <= threshold {
            return Ok(None);
        }
        debug!(count, threshold, "Cache over threshold, sweeping");
        self.sweep_expired().await.map(Some)
    }
}
