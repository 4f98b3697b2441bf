//! Batch descriptors, dispatch payloads and per-batch metrics.

use crate::constants::MAX_BATCH_ROWS;
use crate::error::{TriageError, TriageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open row range `[start_row, end_row)` of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchDescriptor {
    pub batch_id: u64,
    pub start_row: u64,
    pub end_row: u64,
}

impl BatchDescriptor {
    pub fn len(&self) -> u64 {
        self.end_row.saturating_sub(self.start_row)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payload handed to the task queue for one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    pub dataset_name: String,
    pub dataset_path: String,
    pub batch_id: u64,
    pub start_row: u64,
    pub end_row: u64,
    /// Configured batch size at partition time (the last batch may be shorter)
    pub batch_size: u64,
}

impl BatchJob {
    /// Reject row ranges that are inverted, longer than the job's batch size,
    /// or larger than [`MAX_BATCH_ROWS`]
    pub fn validate(&self) -> TriageResult<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_ROWS {
            return Err(TriageError::validation(format!(
                "batch {} has batch_size {} outside 1..={MAX_BATCH_ROWS}",
                self.batch_id, self.batch_size
            )));
        }
        if self.start_row > self.end_row {
            return Err(TriageError::validation(format!(
                "batch {} has inverted range [{}, {})",
                self.batch_id, self.start_row, self.end_row
            )));
        }
        if self.end_row - self.start_row > self.batch_size {
            return Err(TriageError::validation(format!(
                "batch {} covers {} rows, more than its batch_size {}",
                self.batch_id,
                self.end_row - self.start_row,
                self.batch_size
            )));
        }
        Ok(())
    }

    pub fn new(
        dataset_name: &str,
        dataset_path: &str,
        batch_size: u64,
        descriptor: &BatchDescriptor,
    ) -> Self {
        Self {
            dataset_name: dataset_name.to_string(),
            dataset_path: dataset_path.to_string(),
            batch_id: descriptor.batch_id,
            start_row: descriptor.start_row,
            end_row: descriptor.end_row,
            batch_size,
        }
    }

    pub fn descriptor(&self) -> BatchDescriptor {
        BatchDescriptor {
            batch_id: self.batch_id,
            start_row: self.start_row,
            end_row: self.end_row,
        }
    }

    pub fn row_count(&self) -> u64 {
        self.descriptor().len()
    }
}

/// One line of a batch-metrics artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchMetrics {
    pub batch_id: u64,
    /// Records actually processed
    pub batch_size: u64,
    pub max_concurrency: usize,
    pub concurrency_used: usize,
    pub elapsed_sec: f64,
    /// Process RSS high-watermark while the batch ran
    pub ram_mb: f64,
    /// Records per second
    pub throughput: f64,
    pub avg_time_per_record: f64,
    pub started_at: DateTime<Utc>,
    pub classified_count: u64,
    pub error_count: u64,
    pub timeout_count: u64,
    pub cache_hits: u64,
    pub success_rate: f64,
    pub error_rate: f64,
}

/// Counters gathered while a batch runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchTally {
    pub records: u64,
    pub errors: u64,
    pub timeouts: u64,
    pub cache_hits: u64,
}

impl BatchMetrics {
    pub fn from_tally(
        batch_id: u64,
        tally: BatchTally,
        max_concurrency: usize,
        concurrency_used: usize,
        started_at: DateTime<Utc>,
        elapsed_sec: f64,
        ram_mb: f64,
    ) -> Self {
        let records = tally.records as f64;
        let classified = tally.records - tally.errors;
        let ratio = |count: u64| if tally.records == 0 { 0.0 } else { count as f64 / records };

        Self {
            batch_id,
            batch_size: tally.records,
            max_concurrency,
            concurrency_used,
            elapsed_sec,
            ram_mb,
            throughput: if elapsed_sec > 0.0 { records / elapsed_sec } else { 0.0 },
            avg_time_per_record: if tally.records == 0 { 0.0 } else { elapsed_sec / records },
            started_at,
            classified_count: classified,
            error_count: tally.errors,
            timeout_count: tally.timeouts,
            cache_hits: tally.cache_hits,
            success_rate: ratio(classified),
            error_rate: ratio(tally.errors),
        }
    }
}
