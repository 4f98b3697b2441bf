//! # Benchmark Sweep
//!
//! Automated parameter sweep over the processing settings: one full
//! analysis run per `(batch_size, max_concurrent_requests)` grid point, with
//! a persisted context and cooperative cancellation.

pub mod context;
pub mod controller;
pub mod signal;
pub mod sweep;

use thiserror::Error;

pub use context::{
    BenchmarkContext, BenchmarkStatus, ContextStore, RunOutcome, RunRecord, SweepPosition,
};
pub use controller::{BenchmarkController, BenchmarkRequest, BenchmarkTarget};
pub use signal::StopSignal;
pub use sweep::{next_value, sweep_values};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BenchmarkError {
    #[error("A benchmark is already running")]
    AlreadyRunning,

    #[error("Invalid sweep bounds: {0}")]
    InvalidBounds(String),

    #[error("Benchmark target failed: {0}")]
    Target(String),
}

impl BenchmarkError {
    pub fn invalid_bounds<S: Into<String>>(message: S) -> Self {
        Self::InvalidBounds(message.into())
    }

    pub fn target<S: Into<String>>(message: S) -> Self {
        Self::Target(message.into())
    }
}
