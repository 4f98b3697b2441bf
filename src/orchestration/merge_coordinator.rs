//! # Completion & Merge Coordinator
//!
//! Reacts to storage notifications, which may arrive duplicated, reordered
//! or concurrently, and merges a dataset's batch artifacts into the final
//! result and metrics artifacts at most once per analysis run.
//!
//! The only synchronization primitive is the conditional create of the
//! dataset's merge lock. Whoever creates it (`Held`) performs the merge and
//! then overwrites it with `Merged`; everyone else backs off with
//! [`MergeOutcome::AlreadyClaimed`]. The lock is cleared only when a new
//! analysis run starts.

use crate::constants::JSONL_CONTENT_TYPE;
use crate::error::{TriageError, TriageResult};
use crate::logging::log_merge_operation;
use crate::models::DatasetMetadata;
use crate::storage::{
    get_json, put_json, ArtifactKind, ArtifactPaths, ObjectStore, PutOutcome, StorageNotification,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Payload of the merge-lock object; absence of the object is `NoLock`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    NoLock,
    Held {
        run_id: Uuid,
        acquired_at: DateTime<Utc>,
    },
    Merged {
        run_id: Uuid,
        merged_at: DateTime<Utc>,
        record_count: u64,
        batch_count: u64,
    },
}

impl LockState {
    pub fn is_present(&self) -> bool {
        !matches!(self, LockState::NoLock)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Not a batch artifact
    Ignored,
    /// No metadata and no batches yet
    NotReady,
    Partial {
        expected: u64,
        result_artifacts: u64,
        metrics_artifacts: u64,
    },
    AlreadyClaimed,
    Merged {
        run_id: Uuid,
        record_count: u64,
        batch_count: u64,
    },
}

impl MergeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MergeOutcome::Ignored => "ignored",
            MergeOutcome::NotReady => "not_ready",
            MergeOutcome::Partial { .. } => "partial",
            MergeOutcome::AlreadyClaimed => "already_claimed",
            MergeOutcome::Merged { .. } => "merged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    InProgress,
    Merging,
    Completed,
}

/// Status surface polled by the benchmark controller and the HTTP API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResultsStatus {
    pub dataset_name: String,
    pub expected_batches: u64,
    pub result_artifacts: u64,
    pub metrics_artifacts: u64,
    pub completion_fraction: f64,
    pub state: RunState,
}

pub struct MergeCoordinator {
    store: Arc<dyn ObjectStore>,
    paths: ArtifactPaths,
}

impl MergeCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, paths: ArtifactPaths) -> Self {
        Self { store, paths }
    }

    #[instrument(skip(self, notification), fields(object = %notification.object_name))]
    pub async fn handle_notification(
        &self,
        notification: &StorageNotification,
    ) -> TriageResult<MergeOutcome> {
        let Some(artifact) = self.paths.parse_batch_artifact(&notification.object_name) else {
            debug!("Ignoring notification for non-batch object");
            return Ok(MergeOutcome::Ignored);
        };
        self.try_merge(&artifact.dataset_name).await
    }

    /// Merge `dataset_name` if every batch artifact exists and nobody else has claimed it
    pub async fn try_merge(&self, dataset_name: &str) -> TriageResult<MergeOutcome> {
        let result_ids = self.batch_ids(dataset_name, ArtifactKind::Result).await?;
        let metrics_ids = self.batch_ids(dataset_name, ArtifactKind::Metrics).await?;

        if self.read_lock(dataset_name).await?.is_present() {
            debug!(dataset_name, "Merge lock present");
            return Ok(MergeOutcome::AlreadyClaimed);
        }

        let metadata: DatasetMetadata =
            match get_json(self.store.as_ref(), &self.paths.metadata(dataset_name)).await {
                Ok(metadata) => metadata,
                Err(e) if result_ids.is_empty() && metrics_ids.is_empty() => {
                    debug!(dataset_name, error = %e, "No metadata and no batches yet");
                    return Ok(MergeOutcome::NotReady);
                }
                Err(e) => return Err(e.into()),
            };

        let expected = metadata.num_batches;
        let results_present = count_below(&result_ids, expected);
        let metrics_present = count_below(&metrics_ids, expected);
        if results_present < expected || metrics_present < expected {
            debug!(
                dataset_name,
                expected,
                results_present,
                metrics_present,
                "Batches still outstanding"
            );
            return Ok(MergeOutcome::Partial {
                expected,
                result_artifacts: results_present,
                metrics_artifacts: metrics_present,
            });
        }

        let run_id = Uuid::new_v4();
        let held = LockState::Held {
            run_id,
            acquired_at: Utc::now(),
        };
        let lock_path = self.paths.merge_lock(dataset_name);
        if self
            .store
            .put_if_absent(&lock_path, serde_json::to_vec(&held)?)
            .await?
            == PutOutcome::AlreadyExists
        {
            log_merge_operation("claim", dataset_name, "already_claimed", None, None);
            return Ok(MergeOutcome::AlreadyClaimed);
        }
        log_merge_operation("claim", dataset_name, "held", Some(expected), Some(&run_id.to_string()));

        let (result_body, record_count) = self
            .concatenate(dataset_name, expected, ArtifactKind::Result)
            .await;
        let (metrics_body, _) = self
            .concatenate(dataset_name, expected, ArtifactKind::Metrics)
            .await;

        self.store
            .put(&self.paths.merged_result(dataset_name), result_body, JSONL_CONTENT_TYPE)
            .await?;
        self.store
            .put(&self.paths.merged_metrics(dataset_name), metrics_body, JSONL_CONTENT_TYPE)
            .await?;

        let merged = LockState::Merged {
            run_id,
            merged_at: Utc::now(),
            record_count,
            batch_count: expected,
        };
        put_json(self.store.as_ref(), &lock_path, &merged).await?;

        log_merge_operation(
            "merge",
            dataset_name,
            "merged",
            Some(expected),
            Some(&format!("{record_count} records")),
        );
        Ok(MergeOutcome::Merged {
            run_id,
            record_count,
            batch_count: expected,
        })
    }

    /// Concatenate one kind of batch artifact in batch-id order; unreadable batches are skipped
    async fn concatenate(
        &self,
        dataset_name: &str,
        num_batches: u64,
        kind: ArtifactKind,
    ) -> (Vec<u8>, u64) {
        let mut body = Vec::new();
        let mut lines = 0;
        for batch_id in 0..num_batches {
            let path = self.paths.batch_artifact(dataset_name, batch_id, kind);
            match self.store.get(&path).await {
                Ok(data) => {
                    lines += data
                        .split(|b| *b == b'\n')
                        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
                        .count() as u64;
                    body.extend_from_slice(&data);
                    if !data.is_empty() && data.last() != Some(&b'\n') {
                        body.push(b'\n');
                    }
                }
                Err(e) => {
                    warn!(object = %path, error = %e, "Skipping unreadable batch artifact");
                }
            }
        }
        (body, lines)
    }

    async fn batch_ids(&self, dataset_name: &str, kind: ArtifactKind) -> TriageResult<BTreeSet<u64>> {
        Ok(self
            .store
            .list(&self.paths.batch_prefix(dataset_name, kind))
            .await?
            .iter()
            .filter_map(|name| self.paths.parse_batch_artifact(name))
            .filter(|a| a.dataset_name == dataset_name && a.kind == kind)
            .map(|a| a.batch_id)
            .collect())
    }

    pub async fn read_lock(&self, dataset_name: &str) -> TriageResult<LockState> {
        match get_json(self.store.as_ref(), &self.paths.merge_lock(dataset_name)).await {
            Ok(state) => Ok(state),
            Err(e) if e.is_not_found() => Ok(LockState::NoLock),
            Err(e) => Err(e.into()),
        }
    }

    /// Clear the lock so the next complete set of batches can merge again
    pub async fn clear_lock(&self, dataset_name: &str) -> TriageResult<()> {
        self.store.delete(&self.paths.merge_lock(dataset_name)).await?;
        debug!(dataset_name, "Merge lock cleared");
        Ok(())
    }

    /// Delete every batch artifact of a dataset, for a clean new run
    pub async fn clear_batch_artifacts(&self, dataset_name: &str) -> TriageResult<usize> {
        let mut removed = 0;
        for kind in [ArtifactKind::Result, ArtifactKind::Metrics] {
            for batch_id in self.batch_ids(dataset_name, kind).await? {
                self.store
                    .delete(&self.paths.batch_artifact(dataset_name, batch_id, kind))
                    .await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn status(&self, dataset_name: &str) -> TriageResult<BatchResultsStatus> {
        let metadata: DatasetMetadata =
            match get_json(self.store.as_ref(), &self.paths.metadata(dataset_name)).await {
                Ok(metadata) => metadata,
                Err(e) if e.is_not_found() => {
                    return Err(TriageError::not_found(format!("dataset '{dataset_name}'")))
                }
                Err(e) => return Err(e.into()),
            };

        let expected = metadata.num_batches;
        let result_artifacts = count_below(&self.batch_ids(dataset_name, ArtifactKind::Result).await?, expected);
        let metrics_artifacts = count_below(&self.batch_ids(dataset_name, ArtifactKind::Metrics).await?, expected);

        let state = match self.read_lock(dataset_name).await? {
            LockState::Merged { .. } => RunState::Completed,
            LockState::Held { .. } => RunState::Merging,
            LockState::NoLock if result_artifacts == 0 && metrics_artifacts == 0 => {
                RunState::NotStarted
            }
            LockState::NoLock => RunState::InProgress,
        };

        let completion_fraction = if state == RunState::Completed || expected == 0 {
            1.0
        } else {
            result_artifacts.min(metrics_artifacts) as f64 / expected as f64
        };

        Ok(BatchResultsStatus {
            dataset_name: dataset_name.to_string(),
            expected_batches: expected,
            result_artifacts,
            metrics_artifacts,
            completion_fraction,
            state,
        })
    }
}

fn count_below(ids: &BTreeSet<u64>, limit: u64) -> u64 {
    ids.range(..limit).count() as u64
}
