//! # Processing Settings
//!
//! The runtime-tunable pair `(batch_size, max_concurrent_requests)`. The
//! authoritative copy lives in the shared settings artifact so separate hosts
//! agree on it; every host keeps an in-memory copy that changes only through
//! [`SettingsHandle::apply`] (write + adopt) or [`SettingsHandle::reload`]
//! (re-read the artifact).

use crate::config::ProcessingConfig;
use crate::constants::MAX_BATCH_ROWS;
use crate::error::{TriageError, TriageResult};
use crate::storage::{get_json, put_json, ObjectStore};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingSettings {
    pub batch_size: u64,
    pub max_concurrent_requests: usize,
}

impl ProcessingSettings {
    pub fn validate(&self) -> TriageResult<()> {
        if self.batch_size == 0 {
            return Err(TriageError::validation("batch_size must be greater than 0"));
        }
        if self.batch_size > MAX_BATCH_ROWS {
            return Err(TriageError::validation(format!(
                "batch_size must not exceed {MAX_BATCH_ROWS}"
            )));
        }
        if self.max_concurrent_requests == 0 {
            return Err(TriageError::validation(
                "max_concurrent_requests must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl From<&ProcessingConfig> for ProcessingSettings {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_concurrent_requests: config.max_concurrent_requests,
        }
    }
}

pub struct SettingsHandle {
    store: Arc<dyn ObjectStore>,
    object_path: String,
    current: RwLock<ProcessingSettings>,
}

impl std::fmt::Debug for SettingsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsHandle")
            .field("object_path", &self.object_path)
            .field("current", &*self.current.read())
            .finish()
    }
}

impl SettingsHandle {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        object_path: impl Into<String>,
        initial: ProcessingSettings,
    ) -> Self {
        Self {
            store,
            object_path: object_path.into(),
            current: RwLock::new(initial),
        }
    }

    pub fn current(&self) -> ProcessingSettings {
        *self.current.read()
    }

    /// Persist `settings` to the shared artifact, then adopt them locally
    pub async fn apply(&self, settings: ProcessingSettings) -> TriageResult<()> {
        settings.validate()?;
        put_json(self.store.as_ref(), &self.object_path, &settings).await?;
        *self.current.write() = settings;
        info!(
            batch_size = settings.batch_size,
            max_concurrent_requests = settings.max_concurrent_requests,
            "⚙️ SETTINGS: Applied processing settings"
        );
        Ok(())
    }

    /// Adopt whatever the shared artifact holds; a missing artifact keeps the current values
    pub async fn reload(&self) -> TriageResult<ProcessingSettings> {
        match get_json::<ProcessingSettings>(self.store.as_ref(), &self.object_path).await {
            Ok(settings) => {
                settings.validate()?;
                *self.current.write() = settings;
                debug!(?settings, "Reloaded processing settings");
                Ok(settings)
            }
            Err(e) if e.is_not_found() => {
                let current = self.current();
                debug!(?current, "No settings artifact; keeping current settings");
                Ok(current)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Tells other hosts to re-read the settings artifact (`POST {url}`)
#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl ReloadNotifier {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            urls,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    /// Best effort: failures are logged and counted, never propagated
    pub async fn notify_all(&self) -> usize {
        let mut failures = 0;
        for url in &self.urls {
            match self.client.post(url).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(url = %url, "Host reloaded settings");
                }
                Ok(response) => {
                    failures += 1;
                    warn!(url = %url, status = %response.status(), "Settings reload rejected");
                }
                Err(e) => {
                    failures += 1;
                    warn!(url = %url, error = %e, "Settings reload request failed");
                }
            }
        }
        failures
    }
}
