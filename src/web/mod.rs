//! # Web API
//!
//! HTTP surface of the triage pipeline: dataset operations, the worker entry
//! points used by the HTTP task queue and storage notifications, and the
//! benchmark controls.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod handlers;
pub mod response_types;
pub mod routes;
pub mod state;

pub use response_types::{ApiError, ApiResult};
pub use state::AppState;

/// Create the web application with all routes and middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let app = Router::new()
        .merge(routes::health_routes())
        .merge(routes::dataset_routes())
        .merge(routes::worker_routes())
        .merge(routes::benchmark_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Web application created with all routes and middleware");
    app
}
