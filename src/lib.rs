#![allow(clippy::doc_markdown)] // Allow technical terms like JSONL, LLM in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Triage Core
//!
//! Batch orchestration core for LLM-assisted security alert triage.
//!
//! ## Overview
//!
//! A dataset of alerts (one JSON object per line) is split into contiguous
//! batches. Each batch is classified record by record against an external
//! text-generation service under a concurrency cap, with a content-addressed
//! cache in front of the service and per-record fault isolation. Batch outputs
//! land in object storage; every write produces a storage notification, and
//! once all batches of a run are present exactly one notification wins a
//! conditional-create lock and merges them. A benchmark controller sweeps the
//! processing settings over a grid, one full run per grid point.
//!
//! ## Module Organization
//!
//! - [`storage`] - Object store abstraction, adapters and artifact naming
//! - [`models`] - Records, classifications, batch jobs, metrics and dataset metadata
//! - [`classifier`] - Prompting, text-generation client and response repair
//! - [`cache`] - Content-addressed classification cache with age-based sweep
//! - [`orchestration`] - Partitioning, batch processing, dispatch and merge coordination
//! - [`benchmark`] - Parameter sweep controller
//! - [`web`] - axum HTTP surface
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use triage_core::orchestration::partition;
//!
//! let batches = partition(250, 100).unwrap();
//! assert_eq!(batches.len(), 3);
//! assert_eq!(batches[2].start_row, 200);
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod benchmark;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod storage;
pub mod web;

pub use config::{ConfigManager, TriageConfig};
pub use error::{TriageError, TriageResult};
pub use models::{
    BatchDescriptor, BatchJob, BatchMetrics, Classification, ClassificationResult,
    DatasetMetadata, Record, ThreatClass,
};
pub use storage::{ObjectStore, PutOutcome, StorageError, StorageNotification};
