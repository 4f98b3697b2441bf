//! # Dataset Partitioner
//!
//! Splits a dataset of `total_rows` rows into contiguous half-open ranges of
//! `batch_size` rows (the last one possibly shorter). Partitioning needs only
//! the row count from the dataset metadata; rows themselves are never loaded.

use crate::error::{TriageError, TriageResult};
use crate::models::{BatchDescriptor, DatasetMetadata};
use crate::storage::{get_json, put_json, ArtifactPaths, ObjectStore};
use std::sync::Arc;
use tracing::{info, instrument};

/// Batch boundaries for `total_rows` rows in batches of `batch_size`
pub fn partition(total_rows: u64, batch_size: u64) -> TriageResult<Vec<BatchDescriptor>> {
    if batch_size == 0 {
        return Err(TriageError::validation("batch_size must be greater than 0"));
    }
    let num_batches = DatasetMetadata::batches_for(total_rows, batch_size);
    Ok((0..num_batches)
        .map(|batch_id| {
            let start_row = batch_id * batch_size;
            BatchDescriptor {
                batch_id,
                start_row,
                end_row: (start_row + batch_size).min(total_rows),
            }
        })
        .collect())
}

/// Partition plan for one analysis run
#[derive(Debug, Clone)]
pub struct PartitionPlan {
    pub metadata: DatasetMetadata,
    pub batches: Vec<BatchDescriptor>,
}

pub struct Partitioner {
    store: Arc<dyn ObjectStore>,
    paths: ArtifactPaths,
}

impl Partitioner {
    pub fn new(store: Arc<dyn ObjectStore>, paths: ArtifactPaths) -> Self {
        Self { store, paths }
    }

    /// Compute batches for `dataset_name` and persist the partitioning into its metadata.
    ///
    /// Fails without side effects if the dataset or its metadata is missing.
    #[instrument(skip(self))]
    pub async fn plan(&self, dataset_name: &str, batch_size: u64) -> TriageResult<PartitionPlan> {
        if batch_size == 0 {
            return Err(TriageError::validation("batch_size must be greater than 0"));
        }

        let metadata_path = self.paths.metadata(dataset_name);
        let mut metadata: DatasetMetadata =
            match get_json(self.store.as_ref(), &metadata_path).await {
                Ok(metadata) => metadata,
                Err(e) if e.is_not_found() => {
                    return Err(TriageError::not_found(format!(
                        "metadata for dataset '{dataset_name}'"
                    )))
                }
                Err(e) => return Err(e.into()),
            };

        if !self.store.exists(&metadata.dataset_path).await? {
            return Err(TriageError::not_found(format!(
                "dataset object '{}'",
                metadata.dataset_path
            )));
        }

        let batches = partition(metadata.num_rows, batch_size)?;
        let changed = metadata.repartition(batch_size);
        put_json(self.store.as_ref(), &metadata_path, &metadata).await?;

        info!(
            dataset_name = %dataset_name,
            num_rows = metadata.num_rows,
            batch_size,
            num_batches = metadata.num_batches,
            repartitioned = changed,
            "✂️ PARTITIONER: Dataset partitioned"
        );

        Ok(PartitionPlan { metadata, batches })
    }
}
