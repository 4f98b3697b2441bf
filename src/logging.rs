//! # Structured Logging Module
//!
//! Environment-aware structured logging for the batch pipeline: pretty console
//! output while developing, JSON lines in production.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(get_log_level(&environment)));

        let console_layer = if environment == "production" {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(false)
                .json()
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer.with_filter(filter));

        // A subscriber may already be installed by an embedding process or a test harness
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("TRIAGE_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for batch operations
pub fn log_batch_operation(
    operation: &str,
    dataset_name: &str,
    batch_id: Option<u64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        dataset_name = %dataset_name,
        batch_id = batch_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📦 BATCH_OPERATION"
    );
}

/// Log structured data for merge coordination
pub fn log_merge_operation(
    operation: &str,
    dataset_name: &str,
    outcome: &str,
    batch_count: Option<u64>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        dataset_name = %dataset_name,
        outcome = %outcome,
        batch_count = batch_count,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🔀 MERGE_OPERATION"
    );
}

/// Log structured data for benchmark sweep transitions
pub fn log_benchmark_operation(
    operation: &str,
    dataset_name: &str,
    batch_size: Option<u64>,
    concurrency: Option<usize>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        dataset_name = %dataset_name,
        batch_size = batch_size,
        concurrency = concurrency,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📈 BENCHMARK_OPERATION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}
