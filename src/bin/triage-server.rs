//! # Triage Server
//!
//! Runs the whole pipeline in one process: HTTP API, in-process or HTTP batch
//! dispatch, storage-notification driven merging, periodic cache sweeps and
//! the benchmark controller.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration (config/triage.toml when present)
//! cargo run --bin triage-server
//!
//! # Production logging and an explicit configuration file
//! TRIAGE_ENV=production TRIAGE_CONFIG_PATH=/etc/triage.toml cargo run --bin triage-server
//! ```

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use triage_core::benchmark::BenchmarkController;
use triage_core::cache::ClassificationCache;
use triage_core::classifier::{ClassifierClient, HttpTextGenerator};
use triage_core::config::{ConfigManager, QueueMode};
use triage_core::logging;
use triage_core::orchestration::{
    AnalysisService, BatchProcessor, HttpTaskQueue, LocalTaskQueue, MergeCoordinator,
    NotificationDispatcher, ProcessingSettings, ReloadNotifier, SettingsHandle, TaskQueue,
};
use triage_core::storage::{ArtifactPaths, FileSystemObjectStore, NotifyingObjectStore, ObjectStore};
use triage_core::web::{create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!("🚀 Starting Triage Server...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));

    let config_manager = ConfigManager::load().context("Failed to load configuration")?;
    let config = config_manager.config().clone();
    info!("   Environment: {}", config_manager.environment());

    let paths = ArtifactPaths::new(config.storage.clone());
    let (notifying, notifications) = NotifyingObjectStore::new(
        FileSystemObjectStore::new(config.storage.root_dir.clone()),
        paths.bucket().to_string(),
    );
    let store: Arc<dyn ObjectStore> = Arc::new(notifying);
    info!("   Storage root: {}", config.storage.root_dir.display());

    let generator = HttpTextGenerator::new(&config.classifier)
        .context("Failed to build text-generation client")?;
    let classifier = Arc::new(ClassifierClient::new(Arc::new(generator), &config.classifier));
    let cache = Arc::new(ClassificationCache::new(store.clone(), paths.clone(), &config.cache));

    let settings = Arc::new(SettingsHandle::new(
        store.clone(),
        paths.settings(),
        ProcessingSettings::from(&config.processing),
    ));
    let active = settings
        .reload()
        .await
        .context("Failed to read shared processing settings")?;
    info!(
        "   Processing: batch_size={} max_concurrent_requests={}",
        active.batch_size, active.max_concurrent_requests
    );

    let processor = Arc::new(BatchProcessor::new(
        store.clone(),
        paths.clone(),
        cache.clone(),
        classifier,
        settings.clone(),
        config.processing.clone(),
        config.cache.clone(),
    ));

    let queue: Arc<dyn TaskQueue> = match config.queue.mode {
        QueueMode::Local => Arc::new(LocalTaskQueue::new(processor.clone(), &config.queue)),
        QueueMode::Http => Arc::new(
            HttpTaskQueue::new(&config.queue).context("Failed to build HTTP task queue")?,
        ),
    };
    info!("   Queue mode: {:?}", config.queue.mode);

    let coordinator = Arc::new(MergeCoordinator::new(store.clone(), paths.clone()));
    let dispatcher = NotificationDispatcher::spawn(coordinator.clone(), notifications);

    let analysis = Arc::new(
        AnalysisService::new(
            store.clone(),
            paths.clone(),
            coordinator.clone(),
            queue,
            settings,
            config.processing.clone(),
        )
        .with_reload_notifier(ReloadNotifier::new(config.benchmark.reload_urls.clone())),
    );

    let benchmark = Arc::new(BenchmarkController::new(analysis.clone(), config.benchmark.clone()));
    if let Err(e) = benchmark.context_store().load().await {
        warn!(error = %e, "Could not read previous benchmark context");
    }

    let sweeper = spawn_cache_sweeper(cache, config.cache.sweep_interval_seconds);

    let state = AppState::new(analysis, processor, coordinator, benchmark);
    let app = create_app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&config.web.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.web.bind_address))?;
    info!("🎉 Triage Server listening on {}", config.web.bind_address);
    info!("   Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("🛑 Shutdown signal received, stopping background tasks...");
    sweeper.abort();
    dispatcher.abort();

    info!("👋 Triage Server shutdown complete");
    Ok(())
}

/// Periodically delete cache entries older than the configured maximum age
fn spawn_cache_sweeper(
    cache: Arc<ClassificationCache>,
    interval_seconds: u64,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !cache.is_enabled() || interval_seconds == 0 {
            return;
        }
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_seconds));
        interval.tick().await;
        loop {
            interval.tick().await;
            match cache.sweep_expired().await {
                Ok(report) => info!(
                    scanned = report.scanned,
                    removed = report.removed,
                    "🧹 CACHE: Periodic sweep finished"
                ),
                Err(e) => error!(error = %e, "Periodic cache sweep failed"),
            }
        }
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}
