//! # Web API Application State
//!
//! Shared handles to the pipeline services, cloned into every handler.

use crate::benchmark::BenchmarkController;
use crate::orchestration::{AnalysisService, BatchRunner, MergeCoordinator, SettingsHandle};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub analysis: Arc<AnalysisService>,
    /// Executes `/run-batch` requests on this host
    pub batch_runner: Arc<dyn BatchRunner>,
    pub coordinator: Arc<MergeCoordinator>,
    pub benchmark: Arc<BenchmarkController>,
    pub settings: Arc<SettingsHandle>,
}

impl AppState {
    pub fn new(
        analysis: Arc<AnalysisService>,
        batch_runner: Arc<dyn BatchRunner>,
        coordinator: Arc<MergeCoordinator>,
        benchmark: Arc<BenchmarkController>,
    ) -> Self {
        Self {
            settings: analysis.settings().clone(),
            analysis,
            batch_runner,
            coordinator,
            benchmark,
        }
    }
}
