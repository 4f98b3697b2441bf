//! HTTP request handlers for all web endpoints.

pub mod benchmark;
pub mod datasets;
pub mod health;
pub mod worker;
