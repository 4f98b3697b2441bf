//! # Worker Entry Points
//!
//! Endpoints called by other hosts rather than by operators: batch execution
//! for the HTTP task queue, storage-change notifications and processing
//! settings reload.

use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::debug;

use crate::models::BatchJob;
use crate::orchestration::{BatchOutcome, MergeOutcome, ProcessingSettings};
use crate::storage::StorageNotification;
use crate::web::response_types::ApiResult;
use crate::web::state::AppState;

/// Execute one batch on this host: POST /run-batch
///
/// A non-2xx response makes the dispatching queue redeliver the job.
pub async fn run_batch(
    State(state): State<Arc<AppState>>,
    Json(job): Json<BatchJob>,
) -> ApiResult<Json<BatchOutcome>> {
    debug!(dataset = %job.dataset_name, batch_id = job.batch_id, "Batch received over HTTP");
    Ok(Json(state.batch_runner.run_batch(&job).await?))
}

/// Storage-change notification: POST /notifications
pub async fn storage_notification(
    State(state): State<Arc<AppState>>,
    Json(notification): Json<StorageNotification>,
) -> ApiResult<Json<MergeOutcome>> {
    Ok(Json(state.coordinator.handle_notification(&notification).await?))
}

/// Re-read the shared processing settings: POST /reload-config
pub async fn reload_config(State(state): State<Arc<AppState>>) -> ApiResult<Json<ProcessingSettings>> {
    Ok(Json(state.settings.reload().await?))
}
