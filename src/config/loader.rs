//! Configuration Loader
//!
//! Environment-aware configuration loading. Layers an optional TOML file under
//! `TRIAGE__`-prefixed environment variables using the `config` crate, then
//! validates the result before anything else in the process sees it.

use super::error::{ConfigResult, ConfigurationError};
use super::TriageConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "TRIAGE_CONFIG_PATH";

/// Default location of the configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/triage.toml";

/// Loaded, validated configuration plus the environment it was loaded for
#[derive(Debug)]
pub struct ConfigManager {
    config: TriageConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .ok()
            .or_else(|| {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                default.exists().then_some(default)
            });
        Self::load_from_path(path.as_deref())
    }

    /// Load configuration from a specific file (or defaults + environment when `None`)
    pub fn load_from_path(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        debug!(
            environment = %environment,
            config_path = ?path,
            "Loading triage configuration"
        );

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigurationError::file_read_error(
                    path.display().to_string(),
                    "configuration path must point to a regular file",
                ));
            }
            builder = builder.add_source(
                config::File::from(path.to_path_buf())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TRIAGE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment".to_string());

        let layered = builder
            .build()
            .map_err(|e| ConfigurationError::parse_error(source_name.clone(), e))?;

        let config: TriageConfig = layered
            .try_deserialize()
            .map_err(|e| ConfigurationError::parse_error(source_name, e))?;

        let manager = Self::from_config_with_env(config, &environment, path.map(Path::to_path_buf))?;

        info!(
            environment = %manager.environment,
            batch_size = manager.config.processing.batch_size,
            max_concurrent_requests = manager.config.processing.max_concurrent_requests,
            queue_mode = ?manager.config.queue.mode,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(manager))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: TriageConfig) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::from_config_with_env(config, &environment, None).map(Arc::new)
    }

    fn from_config_with_env(
        config: TriageConfig,
        environment: &str,
        source_path: Option<PathBuf>,
    ) -> ConfigResult<ConfigManager> {
        config.validate()?;

        debug!(
            "Configuration: {}",
            serde_json::to_string(&Self::sanitize_config_for_logging(&config))
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );

        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            source_path,
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Environment the configuration was loaded for
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// File the configuration was read from, if any
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Sanitized configuration safe for logs and debug endpoints
    pub fn debug_config(&self) -> serde_json::Value {
        Self::sanitize_config_for_logging(&self.config)
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("TRIAGE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn sanitize_config_for_logging(config: &TriageConfig) -> serde_json::Value {
        let mut config_json = serde_json::to_value(config).unwrap_or(serde_json::Value::Null);
        let sensitive_patterns = ["password", "secret", "key", "token", "credential"];
        Self::sanitize_json_recursive(&mut config_json, &sensitive_patterns);
        config_json
    }

    fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    let is_sensitive = sensitive_patterns
                        .iter()
                        .any(|pattern| key_lower.contains(pattern));

                    if is_sensitive {
                        if !val.is_null() {
                            *val = serde_json::Value::String("[MASKED]".to_string());
                        }
                    } else {
                        Self::sanitize_json_recursive(val, sensitive_patterns);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    Self::sanitize_json_recursive(item, sensitive_patterns);
                }
            }
            _ => {}
        }
    }
}
