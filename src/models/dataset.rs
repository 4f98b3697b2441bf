use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile of an uploaded dataset plus its current partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub dataset_name: String,
    pub dataset_path: String,
    pub num_rows: u64,
    pub num_columns: usize,
    pub features: Vec<String>,
    pub batch_size: u64,
    pub num_batches: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl DatasetMetadata {
    /// `ceil(num_rows / batch_size)`; callers guarantee `batch_size > 0`
    pub fn batches_for(num_rows: u64, batch_size: u64) -> u64 {
        num_rows.div_ceil(batch_size)
    }

    /// Re-partition with a new batch size; returns whether anything changed
    pub fn repartition(&mut self, batch_size: u64) -> bool {
        let num_batches = Self::batches_for(self.num_rows, batch_size);
        let changed = self.batch_size != batch_size || self.num_batches != num_batches;
        self.batch_size = batch_size;
        self.num_batches = num_batches;
        changed
    }
}
