//! # Triage Configuration System
//!
//! Explicit, validated configuration for every component of the triage
//! pipeline. A single [`TriageConfig`] is built once at startup (see
//! [`ConfigManager`]) and handed to components by reference; nothing reads
//! configuration from global state.
//!
//! ## Layering
//!
//! 1. Built-in defaults (`Default` impls below)
//! 2. Optional TOML file (`config/triage.toml` or `TRIAGE_CONFIG_PATH`)
//! 3. Environment variables: `TRIAGE__PROCESSING__BATCH_SIZE=50`
//!
//! The runtime-tunable pair `(batch_size, max_concurrent_requests)` is the
//! one exception: it is seeded from [`ProcessingConfig`] and then owned by
//! [`crate::orchestration::settings::SettingsHandle`] so the benchmark sweep
//! can change it while the process runs.

pub mod error;
pub mod loader;

use crate::constants::MAX_BATCH_ROWS;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/triage.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TriageConfig {
    /// Object storage layout
    pub storage: StorageConfig,

    /// Batch processing defaults
    pub processing: ProcessingConfig,

    /// External text-generation client settings
    pub classifier: ClassifierConfig,

    /// Classification cache settings
    pub cache: CacheConfig,

    /// Batch dispatch settings
    pub queue: QueueConfig,

    /// Benchmark sweep settings
    pub benchmark: BenchmarkConfig,

    /// Outward HTTP API settings
    pub web: WebConfig,
}

/// Object storage layout: root location plus one directory per artifact namespace
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory used by the filesystem object store
    pub root_dir: PathBuf,
    /// Logical bucket name reported in storage notifications
    pub bucket_name: String,
    pub dataset_dir: String,
    pub batch_result_dir: String,
    pub batch_metrics_dir: String,
    pub result_dir: String,
    pub metrics_dir: String,
    pub cache_dir: String,
    pub flag_dir: String,
    /// Object name of the shared processing-settings artifact
    pub settings_object: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("storage"),
            bucket_name: "main-asset-storage".to_string(),
            dataset_dir: "datasets".to_string(),
            batch_result_dir: "batch_results".to_string(),
            batch_metrics_dir: "batch_metrics".to_string(),
            result_dir: "results".to_string(),
            metrics_dir: "metrics".to_string(),
            cache_dir: "cache".to_string(),
            flag_dir: "control_flags".to_string(),
            settings_object: "config.json".to_string(),
        }
    }
}

/// Batch processing defaults
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Records per batch
    pub batch_size: u64,
    /// Upper bound on concurrent classification calls per batch
    pub max_concurrent_requests: usize,
    /// Byte size of each ranged read when streaming a dataset
    pub chunk_size_bytes: u64,
    /// Interval between RSS samples while a batch runs
    pub memory_sample_interval_ms: u64,
    /// Record field copied into each result's `timestamp`
    pub timestamp_field: String,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_concurrent_requests: 16,
            chunk_size_bytes: 256 * 1024,
            memory_sample_interval_ms: 250,
            timestamp_field: "time".to_string(),
        }
    }
}

impl ProcessingConfig {
    pub fn memory_sample_interval(&self) -> Duration {
        Duration::from_millis(self.memory_sample_interval_ms)
    }
}

/// External text-generation client settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClassifierConfig {
    /// HTTP endpoint of the generation service
    pub endpoint: String,
    /// Bearer token for the generation service, if any
    pub api_key: Option<String>,
    /// Caller-side timeout for a single generation call
    pub request_timeout_seconds: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081/generate".to_string(),
            api_key: None,
            request_timeout_seconds: 30,
            temperature: 0.2,
            top_p: 1.0,
            top_k: 1,
            max_output_tokens: 512,
        }
    }
}

impl ClassifierConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Classification cache settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entries older than this are removed by the sweep
    pub max_age_seconds: u64,
    /// Entry count above which a batch triggers a sweep before classifying
    pub sweep_threshold: usize,
    /// Period of the background sweep in the server binary (0 disables it)
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_seconds: 60 * 60 * 24 * 7,
            sweep_threshold: 1000,
            sweep_interval_seconds: 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_seconds)
    }
}

/// How batch jobs are dispatched
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// In-process tokio tasks
    #[default]
    Local,
    /// HTTP POST to a worker's `/run-batch` endpoint
    Http,
}

/// Batch dispatch settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub mode: QueueMode,
    /// Base URL of the worker host receiving `/run-batch`
    pub worker_url: String,
    /// Delivery attempts per batch before the local queue gives up
    pub max_delivery_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub request_timeout_seconds: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            mode: QueueMode::Local,
            worker_url: "http://localhost:8080".to_string(),
            max_delivery_attempts: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            request_timeout_seconds: 60,
        }
    }
}

/// Benchmark sweep settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Largest accepted batch-size ceiling for a sweep
    pub max_batch_size_sup: u64,
    /// Largest accepted concurrency ceiling for a sweep
    pub max_concurrency_sup: usize,
    /// Consecutive polls without progress before a grid point is abandoned
    pub max_poll_attempts: u32,
    pub poll_base_delay_ms: u64,
    pub poll_max_delay_ms: u64,
    /// Pause between consecutive grid points
    pub inter_run_cooldown_seconds: u64,
    /// Where the sweep context is persisted
    pub context_path: PathBuf,
    /// Presence of this file requests cancellation of the running sweep
    pub stop_flag_path: PathBuf,
    /// Worker hosts told to reload processing settings after each change
    pub reload_urls: Vec<String>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            max_batch_size_sup: 250,
            max_concurrency_sup: 16,
            max_poll_attempts: 20,
            poll_base_delay_ms: 5000,
            poll_max_delay_ms: 60_000,
            inter_run_cooldown_seconds: 30,
            context_path: PathBuf::from("assets/benchmark_context.json"),
            stop_flag_path: PathBuf::from("assets/benchmark_stop.flag"),
            reload_urls: Vec::new(),
        }
    }
}

impl BenchmarkConfig {
    pub fn inter_run_cooldown(&self) -> Duration {
        Duration::from_secs(self.inter_run_cooldown_seconds)
    }
}

/// Outward HTTP API settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    pub bind_address: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

impl TriageConfig {
    /// Validate cross-field invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.processing.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "processing.batch_size",
                "0",
                "batch size must be greater than 0",
            ));
        }

        if self.processing.batch_size > MAX_BATCH_ROWS {
            return Err(ConfigurationError::invalid_value(
                "processing.batch_size",
                self.processing.batch_size.to_string(),
                format!("batch size must not exceed {MAX_BATCH_ROWS}"),
            ));
        }

        if self.processing.max_concurrent_requests == 0 {
            return Err(ConfigurationError::invalid_value(
                "processing.max_concurrent_requests",
                "0",
                "concurrency must be greater than 0",
            ));
        }

        if self.processing.chunk_size_bytes == 0 {
            return Err(ConfigurationError::invalid_value(
                "processing.chunk_size_bytes",
                "0",
                "chunk size must be greater than 0",
            ));
        }

        if self.classifier.request_timeout_seconds == 0 {
            return Err(ConfigurationError::invalid_value(
                "classifier.request_timeout_seconds",
                "0",
                "timeout must be greater than 0",
            ));
        }

        if self.queue.max_delivery_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.max_delivery_attempts",
                "0",
                "at least one delivery attempt is required",
            ));
        }

        if self.queue.mode == QueueMode::Http && self.queue.worker_url.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "queue.worker_url",
                "http queue configuration",
            ));
        }

        if self.benchmark.max_poll_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "benchmark.max_poll_attempts",
                "0",
                "at least one poll attempt is required",
            ));
        }

        if self.benchmark.poll_base_delay_ms > self.benchmark.poll_max_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "benchmark.poll_base_delay_ms",
                self.benchmark.poll_base_delay_ms.to_string(),
                "base delay cannot exceed benchmark.poll_max_delay_ms",
            ));
        }

        let namespaces = [
            ("storage.dataset_dir", &self.storage.dataset_dir),
            ("storage.batch_result_dir", &self.storage.batch_result_dir),
            ("storage.batch_metrics_dir", &self.storage.batch_metrics_dir),
            ("storage.result_dir", &self.storage.result_dir),
            ("storage.metrics_dir", &self.storage.metrics_dir),
            ("storage.cache_dir", &self.storage.cache_dir),
            ("storage.flag_dir", &self.storage.flag_dir),
        ];
        for (field, value) in namespaces {
            if value.is_empty() || value.contains('/') {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.as_str(),
                    "namespace must be a single non-empty path segment",
                ));
            }
        }
        if self.storage.batch_result_dir == self.storage.batch_metrics_dir {
            return Err(ConfigurationError::invalid_value(
                "storage.batch_metrics_dir",
                self.storage.batch_metrics_dir.as_str(),
                "batch results and batch metrics need distinct namespaces",
            ));
        }

        Ok(())
    }
}
