//! # Resilience Module
//!
//! Retry timing shared by the local task queue (batch redelivery) and the
//! benchmark controller (completion polling).

pub mod backoff;

pub use backoff::BackoffPolicy;
