//! # Dataset Handlers
//!
//! Upload, analysis, status and result retrieval for a dataset.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::info;

use crate::models::{ClassificationResult, DatasetMetadata};
use crate::orchestration::{AnalysisStarted, BatchResultsStatus};
use crate::web::response_types::ApiResult;
use crate::web::state::AppState;

/// Upload a JSONL dataset: POST /datasets/{filename}
pub async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<DatasetMetadata>)> {
    let metadata = state.analysis.upload_dataset(&filename, body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(metadata)))
}

/// Start an analysis run: POST /datasets/{name}/analyze
pub async fn analyze_dataset(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<(StatusCode, Json<AnalysisStarted>)> {
    let started = state.analysis.analyze_dataset(&name).await?;
    info!(dataset = %name, num_batches = started.num_batches, "Analysis accepted");
    Ok((StatusCode::ACCEPTED, Json(started)))
}

/// Run progress: GET /datasets/{name}/status
pub async fn dataset_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<BatchResultsStatus>> {
    Ok(Json(state.analysis.batch_results_status(&name).await?))
}

/// Merged results of the last completed run: GET /datasets/{name}/result
pub async fn dataset_result(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<Vec<ClassificationResult>>> {
    Ok(Json(state.analysis.merged_result(&name).await?))
}
