//! # Data Models
//!
//! Plain serde types that move between the partitioner, the batch processor,
//! the merge coordinator and storage.

pub mod batch;
pub mod classification;
pub mod dataset;
pub mod record;

pub use batch::{BatchDescriptor, BatchJob, BatchMetrics, BatchTally};
pub use classification::{Classification, ClassificationResult, ThreatClass};
pub use dataset::DatasetMetadata;
pub use record::Record;
