//! # Health Check Handlers

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    benchmark_running: bool,
}

/// Basic health check endpoint: GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        benchmark_running: state.benchmark.is_running(),
    })
}
