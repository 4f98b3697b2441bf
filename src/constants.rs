//! # System Constants
//!
//! Wire-level constants shared by the storage layout, the batch processor and
//! the merge coordinator.

/// Content type of every JSON Lines artifact (datasets, batch and merged outputs)
pub const JSONL_CONTENT_TYPE: &str = "application/x-ndjson";

/// Content type of single-document JSON artifacts (metadata, cache entries, locks)
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Only accepted dataset format
pub const DATASET_EXTENSION: &str = "jsonl";

/// Timestamp recorded when a record lacks the configured timestamp field
pub const MISSING_TIMESTAMP: &str = "n/a";

/// Explanation used when generated output omits one
pub const DEFAULT_EXPLANATION: &str = "no explanation";

/// Artifact name fragments
pub mod artifacts {
    pub const RESULT_SUFFIX: &str = "result";
    pub const METRICS_SUFFIX: &str = "metrics";
    pub const METADATA_SUFFIX: &str = "metadata";
    pub const MERGE_LOCK_SUFFIX: &str = "merge.lock";
}

/// Largest dataset accepted by the upload endpoint
pub const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Largest row range a single batch job may cover
pub const MAX_BATCH_ROWS: u64 = 100_000;
