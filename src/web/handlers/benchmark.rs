//! # Benchmark Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

use crate::benchmark::{BenchmarkContext, BenchmarkRequest, BenchmarkStatus};
use crate::web::response_types::ApiResult;
use crate::web::state::AppState;

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stop_requested: bool,
}

#[derive(Debug, Serialize)]
pub struct BenchmarkStatusResponse {
    pub running: bool,
    pub status: BenchmarkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BenchmarkContext>,
}

/// Launch a sweep in the background: POST /benchmark/start
pub async fn start_benchmark(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BenchmarkRequest>,
) -> ApiResult<(StatusCode, Json<BenchmarkContext>)> {
    let context = state.benchmark.start(request).await?;
    Ok((StatusCode::ACCEPTED, Json(context)))
}

/// Request cancellation at the next grid point or poll: POST /benchmark/stop
pub async fn stop_benchmark(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    Json(StopResponse {
        stop_requested: state.benchmark.stop().await,
    })
}

/// Persisted sweep context: GET /benchmark/status
pub async fn benchmark_status(State(state): State<Arc<AppState>>) -> Json<BenchmarkStatusResponse> {
    let context = state.benchmark.status();
    Json(BenchmarkStatusResponse {
        running: state.benchmark.is_running(),
        status: context
            .as_ref()
            .map(|c| c.status)
            .unwrap_or(BenchmarkStatus::Idle),
        context,
    })
}
