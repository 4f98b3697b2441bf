//! # Analysis Service
//!
//! The outward operations of the pipeline: upload a dataset, start an
//! analysis run, report run status and fetch merged results. An analysis run
//! resets the previous run's state (merge lock and batch artifacts),
//! partitions the dataset with the current batch size and fans the batches
//! out through the task queue.

use super::merge_coordinator::{BatchResultsStatus, MergeCoordinator};
use super::partitioner::Partitioner;
use super::row_stream::profile_dataset;
use super::settings::{ProcessingSettings, ReloadNotifier, SettingsHandle};
use super::task_queue::TaskQueue;
use crate::config::ProcessingConfig;
use crate::constants::JSONL_CONTENT_TYPE;
use crate::error::{TriageError, TriageResult};
use crate::logging::log_batch_operation;
use crate::models::{BatchJob, ClassificationResult, DatasetMetadata};
use crate::storage::{get_json, put_json, ArtifactPaths, ObjectStore};
use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Returned when a run has been fanned out
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisStarted {
    pub metadata: DatasetMetadata,
    pub num_batches: u64,
    pub cleared_artifacts: usize,
}

pub struct AnalysisService {
    store: Arc<dyn ObjectStore>,
    paths: ArtifactPaths,
    partitioner: Partitioner,
    coordinator: Arc<MergeCoordinator>,
    queue: Arc<dyn TaskQueue>,
    settings: Arc<SettingsHandle>,
    reload: ReloadNotifier,
    processing: ProcessingConfig,
}

impl AnalysisService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        paths: ArtifactPaths,
        coordinator: Arc<MergeCoordinator>,
        queue: Arc<dyn TaskQueue>,
        settings: Arc<SettingsHandle>,
        processing: ProcessingConfig,
    ) -> Self {
        Self {
            partitioner: Partitioner::new(store.clone(), paths.clone()),
            store,
            paths,
            coordinator,
            queue,
            settings,
            reload: ReloadNotifier::new(Vec::new()),
            processing,
        }
    }

    /// Hosts told to reload processing settings whenever they change
    pub fn with_reload_notifier(mut self, reload: ReloadNotifier) -> Self {
        self.reload = reload;
        self
    }

    pub fn settings(&self) -> &Arc<SettingsHandle> {
        &self.settings
    }

    /// Store a JSONL dataset and compute its metadata
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload_dataset(&self, filename: &str, data: Vec<u8>) -> TriageResult<DatasetMetadata> {
        let dataset_name = ArtifactPaths::dataset_name_from_filename(filename)?;
        let dataset_path = self.paths.dataset(&dataset_name);

        self.store.put(&dataset_path, data, JSONL_CONTENT_TYPE).await?;

        let profile = match profile_dataset(
            self.store.clone(),
            &dataset_path,
            self.processing.chunk_size_bytes,
        )
        .await
        {
            Ok(profile) => profile,
            Err(e) => {
                if let Err(cleanup) = self.store.delete(&dataset_path).await {
                    warn!(error = %cleanup, "Could not remove rejected dataset");
                }
                return Err(e);
            }
        };

        let batch_size = self.settings.current().batch_size;
        let metadata = DatasetMetadata {
            dataset_name: dataset_name.clone(),
            dataset_path,
            num_rows: profile.num_rows,
            num_columns: profile.features.len(),
            features: profile.features,
            batch_size,
            num_batches: DatasetMetadata::batches_for(profile.num_rows, batch_size),
            uploaded_at: Utc::now(),
        };
        put_json(self.store.as_ref(), &self.paths.metadata(&dataset_name), &metadata).await?;

        info!(
            dataset_name = %dataset_name,
            num_rows = metadata.num_rows,
            num_columns = metadata.num_columns,
            "📥 DATASET: Uploaded"
        );
        Ok(metadata)
    }

    pub async fn dataset_metadata(&self, dataset_name: &str) -> TriageResult<DatasetMetadata> {
        ArtifactPaths::validate_dataset_name(dataset_name)?;
        match get_json(self.store.as_ref(), &self.paths.metadata(dataset_name)).await {
            Ok(metadata) => Ok(metadata),
            Err(e) if e.is_not_found() => Err(TriageError::not_found(format!(
                "dataset '{dataset_name}'"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Start a fresh analysis run of `dataset_name`
    #[instrument(skip(self))]
    pub async fn analyze_dataset(&self, dataset_name: &str) -> TriageResult<AnalysisStarted> {
        ArtifactPaths::validate_dataset_name(dataset_name)?;
        let batch_size = self.settings.current().batch_size;

        // Fail before touching the previous run if the dataset is unknown
        self.dataset_metadata(dataset_name).await?;

        // Artifacts go first so a late notification from the previous run sees a partial set
        let cleared_artifacts = self.coordinator.clear_batch_artifacts(dataset_name).await?;
        self.coordinator.clear_lock(dataset_name).await?;

        let plan = self.partitioner.plan(dataset_name, batch_size).await?;
        let num_batches = plan.batches.len() as u64;

        try_join_all(plan.batches.iter().map(|descriptor| {
            let job = BatchJob::new(dataset_name, &plan.metadata.dataset_path, batch_size, descriptor);
            self.queue.enqueue(job)
        }))
        .await?;

        if num_batches == 0 {
            // Nothing will ever be written, so nothing would trigger the merge
            self.coordinator.try_merge(dataset_name).await?;
        }

        log_batch_operation(
            "analyze",
            dataset_name,
            None,
            "fanned_out",
            Some(&format!("{num_batches} batches of {batch_size}")),
        );

        Ok(AnalysisStarted {
            metadata: plan.metadata,
            num_batches,
            cleared_artifacts,
        })
    }

    pub async fn batch_results_status(&self, dataset_name: &str) -> TriageResult<BatchResultsStatus> {
        ArtifactPaths::validate_dataset_name(dataset_name)?;
        self.coordinator.status(dataset_name).await
    }

    /// Merged classification results of the last completed run
    pub async fn merged_result(&self, dataset_name: &str) -> TriageResult<Vec<ClassificationResult>> {
        ArtifactPaths::validate_dataset_name(dataset_name)?;
        let data = match self.store.get(&self.paths.merged_result(dataset_name)).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                return Err(TriageError::not_found(format!(
                    "merged result for dataset '{dataset_name}'"
                )))
            }
            Err(e) => return Err(e.into()),
        };

        data.split(|b| *b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .map(|line| serde_json::from_slice(line).map_err(TriageError::from))
            .collect()
    }

    pub async fn clear_merge_lock(&self, dataset_name: &str) -> TriageResult<()> {
        self.coordinator.clear_lock(dataset_name).await
    }

    /// Persist new processing settings and ask other hosts to pick them up
    pub async fn apply_settings(&self, settings: ProcessingSettings) -> TriageResult<()> {
        self.settings.apply(settings).await?;
        if !self.reload.is_empty() {
            let failures = self.reload.notify_all().await;
            if failures > 0 {
                warn!(failures, "Some hosts did not confirm the settings reload");
            }
        }
        Ok(())
    }
}
