//! Cooperative cancellation for the sweep.
//!
//! The signal is raised either in-process ([`StopSignal::raise`]) or by an
//! operator creating the flag file; the sweep observes both.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct StopSignal {
    raised: Arc<AtomicBool>,
    wake: Arc<Notify>,
    flag_path: PathBuf,
}

impl StopSignal {
    pub fn new(flag_path: impl Into<PathBuf>) -> Self {
        Self {
            raised: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            flag_path: flag_path.into(),
        }
    }

    pub fn flag_path(&self) -> &Path {
        &self.flag_path
    }

    pub async fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        if let Some(parent) = self.flag_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(e) = tokio::fs::write(&self.flag_path, b"stop").await {
            warn!(path = %self.flag_path.display(), error = %e, "Could not write stop flag file");
        }
        self.wake.notify_waiters();
    }

    pub async fn is_raised(&self) -> bool {
        if self.raised.load(Ordering::SeqCst) {
            return true;
        }
        tokio::fs::try_exists(&self.flag_path).await.unwrap_or(false)
    }

    pub async fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
        match tokio::fs::remove_file(&self.flag_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %self.flag_path.display(), error = %e, "Could not remove stop flag file");
            }
        }
    }

    /// Sleep for `duration`, returning early if raised in-process.
    ///
    /// Returns whether the signal is raised on wake-up.
    pub async fn sleep(&self, duration: Duration) -> bool {
        let woken = self.wake.notified();
        if self.is_raised().await {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = woken => {}
        }
        self.is_raised().await
    }
}
