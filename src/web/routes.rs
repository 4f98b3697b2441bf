//! Route definitions grouped by functionality.

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::constants::MAX_UPLOAD_BYTES;
use crate::web::{handlers, state::AppState};

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(handlers::health::health_check))
}

/// Dataset upload, analysis and result retrieval
pub fn dataset_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/datasets/:filename",
            post(handlers::datasets::upload_dataset).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/datasets/:name/analyze", post(handlers::datasets::analyze_dataset))
        .route("/datasets/:name/status", get(handlers::datasets::dataset_status))
        .route("/datasets/:name/result", get(handlers::datasets::dataset_result))
}

/// Worker-facing entry points: batch execution, storage notifications, settings reload
pub fn worker_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/run-batch", post(handlers::worker::run_batch))
        .route("/notifications", post(handlers::worker::storage_notification))
        .route("/reload-config", post(handlers::worker::reload_config))
}

pub fn benchmark_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/benchmark/start", post(handlers::benchmark::start_benchmark))
        .route("/benchmark/stop", post(handlers::benchmark::stop_benchmark))
        .route("/benchmark/status", get(handlers::benchmark::benchmark_status))
}
