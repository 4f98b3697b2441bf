//! Process RSS high-watermark sampling.

use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::warn;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Background task recording peak resident memory until stopped
pub struct MemorySampler {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<u64>,
}

impl MemorySampler {
    pub fn start(interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let pid = match sysinfo::get_current_pid() {
                Ok(pid) => pid,
                Err(e) => {
                    warn!(error = %e, "Cannot resolve current pid; memory sampling disabled");
                    return 0;
                }
            };
            let mut system = System::new();
            let mut peak = sample(&mut system, pid);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(interval) => {
                        peak = peak.max(sample(&mut system, pid));
                    }
                }
            }
            peak.max(sample(&mut system, pid))
        });

        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    /// Stop sampling and return the peak in MiB
    pub async fn finish(mut self) -> f64 {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        match (&mut self.handle).await {
            Ok(bytes) => bytes as f64 / BYTES_PER_MIB,
            Err(e) => {
                warn!(error = %e, "Memory sampler task failed");
                0.0
            }
        }
    }
}

impl Drop for MemorySampler {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.handle.abort();
        }
    }
}

fn sample(system: &mut System, pid: Pid) -> u64 {
    if !system.refresh_process(pid) {
        return 0;
    }
    system.process(pid).map(|p| p.memory()).unwrap_or(0)
}
