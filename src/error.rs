//! Error types for the triage pipeline.
//!
//! Each concern owns a `thiserror` enum ([`StorageError`], [`ClassificationError`],
//! [`ConfigurationError`], [`BenchmarkError`]); [`TriageError`] aggregates them
//! for operations that cross module boundaries.

use crate::benchmark::BenchmarkError;
use crate::config::ConfigurationError;
use crate::storage::StorageError;
use thiserror::Error;

pub use crate::classifier::ClassificationError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TriageError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Task queue error: {0}")]
    TaskQueue(String),
    #[error("Benchmark error: {0}")]
    Benchmark(#[from] BenchmarkError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TriageError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(what: S) -> Self {
        Self::NotFound(what.into())
    }

    pub fn task_queue<S: Into<String>>(message: S) -> Self {
        Self::TaskQueue(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// True when the error means "the thing is not there yet" rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TriageError::NotFound(_) | TriageError::Storage(StorageError::NotFound { .. })
        )
    }
}

impl From<serde_json::Error> for TriageError {
    fn from(error: serde_json::Error) -> Self {
        TriageError::Serialization(format!("JSON serialization error: {error}"))
    }
}

pub type TriageResult<T> = Result<T, TriageError>;
