//! # Batch Dispatch
//!
//! The inter-batch fan-out is opaque to the rest of the pipeline: a
//! [`TaskQueue`] accepts a [`BatchJob`] and guarantees at-least-once
//! execution somewhere. Two adapters are provided:
//!
//! - [`LocalTaskQueue`]: runs each job on a tokio task in this process,
//!   redelivering failed jobs with capped exponential backoff
//! - [`HttpTaskQueue`]: POSTs the job to a worker host's `/run-batch` endpoint

use super::batch_processor::BatchRunner;
use crate::config::QueueConfig;
use crate::error::{TriageError, TriageResult};
use crate::logging::log_error;
use crate::models::BatchJob;
use crate::resilience::BackoffPolicy;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Accept `job` for eventual execution
    async fn enqueue(&self, job: BatchJob) -> TriageResult<()>;
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// In-process queue: one tokio task per job, redelivered on failure
pub struct LocalTaskQueue {
    runner: Arc<dyn BatchRunner>,
    backoff: BackoffPolicy,
    max_attempts: u32,
    in_flight: Arc<InFlight>,
}

impl LocalTaskQueue {
    pub fn new(runner: Arc<dyn BatchRunner>, config: &QueueConfig) -> Self {
        Self {
            runner,
            backoff: BackoffPolicy::for_queue(config),
            max_attempts: config.max_delivery_attempts.max(1),
            in_flight: Arc::new(InFlight::default()),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Wait until every accepted job has finished or exhausted its attempts
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl TaskQueue for LocalTaskQueue {
    async fn enqueue(&self, job: BatchJob) -> TriageResult<()> {
        let runner = self.runner.clone();
        let backoff = self.backoff;
        let max_attempts = self.max_attempts;
        let in_flight = self.in_flight.clone();
        in_flight.count.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            for attempt in 0..max_attempts {
                match runner.run_batch(&job).await {
                    Ok(_) => break,
                    Err(e) if attempt + 1 < max_attempts => {
                        let delay = backoff.delay_for(attempt);
                        warn!(
                            dataset = %job.dataset_name,
                            batch_id = job.batch_id,
                            attempt = attempt + 1,
                            retry_in_ms = delay.as_millis() as u64,
                            error = %e,
                            "Batch failed; redelivering"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => {
                        log_error(
                            "local_task_queue",
                            "run_batch",
                            &e.to_string(),
                            Some(&format!(
                                "{} batch {} gave up after {max_attempts} attempts",
                                job.dataset_name, job.batch_id
                            )),
                        );
                    }
                }
            }

            if in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
                in_flight.idle.notify_waiters();
            }
        });

        debug!("Batch job accepted by local queue");
        Ok(())
    }
}

/// Remote queue: hands each job to a worker host over HTTP
#[derive(Debug, Clone)]
pub struct HttpTaskQueue {
    client: reqwest::Client,
    run_batch_url: String,
}

impl HttpTaskQueue {
    pub fn new(config: &QueueConfig) -> TriageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| TriageError::task_queue(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            run_batch_url: format!("{}/run-batch", config.worker_url.trim_end_matches('/')),
        })
    }

    pub fn run_batch_url(&self) -> &str {
        &self.run_batch_url
    }
}

#[async_trait]
impl TaskQueue for HttpTaskQueue {
    async fn enqueue(&self, job: BatchJob) -> TriageResult<()> {
        let response = self
            .client
            .post(&self.run_batch_url)
            .json(&job)
            .send()
            .await
            .map_err(|e| TriageError::task_queue(format!("dispatch of batch {} failed: {e}", job.batch_id)))?;

        if !response.status().is_success() {
            return Err(TriageError::task_queue(format!(
                "worker rejected batch {} with {}",
                job.batch_id,
                response.status()
            )));
        }

        info!(dataset = %job.dataset_name, batch_id = job.batch_id, "📤 QUEUE: Batch dispatched");
        Ok(())
    }
}
