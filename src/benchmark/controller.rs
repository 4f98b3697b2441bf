//! # Benchmark Controller
//!
//! Sweeps `(batch_size, max_concurrent_requests)` over a grid and runs one
//! full analysis of a dataset per grid point, waiting for each run to
//! complete before moving on. The controller only talks to the pipeline
//! through [`BenchmarkTarget`], so the same loop drives an in-process
//! [`AnalysisService`] or a test double.
//!
//! Status transitions: `running ⇄ polling → running | aborted | error | completed`.
//! Processing settings are backed up before the first grid point and restored
//! on every exit path.

use super::context::{
    BenchmarkContext, BenchmarkStatus, ContextStore, RunOutcome, RunRecord, SweepPosition,
};
use super::signal::StopSignal;
use super::sweep::sweep_values;
use super::BenchmarkError;
use crate::config::BenchmarkConfig;
use crate::error::TriageResult;
use crate::logging::{log_benchmark_operation, log_error};
use crate::orchestration::{AnalysisService, BatchResultsStatus, ProcessingSettings, RunState};
use crate::resilience::BackoffPolicy;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// The pipeline as seen by the sweep
#[async_trait]
pub trait BenchmarkTarget: Send + Sync {
    fn current_settings(&self) -> ProcessingSettings;

    async fn apply_settings(&self, settings: ProcessingSettings) -> TriageResult<()>;

    async fn dataset_rows(&self, dataset_name: &str) -> TriageResult<u64>;

    /// Clear stale run state and start a new analysis of the dataset
    async fn start_run(&self, dataset_name: &str) -> TriageResult<()>;

    async fn run_status(&self, dataset_name: &str) -> TriageResult<BatchResultsStatus>;
}

#[async_trait]
impl BenchmarkTarget for AnalysisService {
    fn current_settings(&self) -> ProcessingSettings {
        self.settings().current()
    }

    async fn apply_settings(&self, settings: ProcessingSettings) -> TriageResult<()> {
        AnalysisService::apply_settings(self, settings).await
    }

    async fn dataset_rows(&self, dataset_name: &str) -> TriageResult<u64> {
        Ok(self.dataset_metadata(dataset_name).await?.num_rows)
    }

    async fn start_run(&self, dataset_name: &str) -> TriageResult<()> {
        self.clear_merge_lock(dataset_name).await?;
        self.analyze_dataset(dataset_name).await?;
        Ok(())
    }

    async fn run_status(&self, dataset_name: &str) -> TriageResult<BatchResultsStatus> {
        self.batch_results_status(dataset_name).await
    }
}

/// Sweep bounds: both parameters range over `[inf, sup]` by `step`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    pub dataset_name: String,
    pub batch_size_inf: u64,
    pub batch_size_sup: u64,
    pub batch_size_step: u64,
    pub concurrency_inf: u64,
    pub concurrency_sup: u64,
    pub concurrency_step: u64,
}

impl BenchmarkRequest {
    pub fn validate(&self, config: &BenchmarkConfig) -> Result<(), BenchmarkError> {
        let axes = [
            ("batch_size", self.batch_size_inf, self.batch_size_sup, self.batch_size_step),
            ("concurrency", self.concurrency_inf, self.concurrency_sup, self.concurrency_step),
        ];
        for (name, inf, sup, step) in axes {
            if inf == 0 || step == 0 {
                return Err(BenchmarkError::invalid_bounds(format!(
                    "{name}: lower bound and step must be at least 1"
                )));
            }
            if inf > sup {
                return Err(BenchmarkError::invalid_bounds(format!(
                    "{name}: lower bound {inf} exceeds upper bound {sup}"
                )));
            }
        }
        if self.batch_size_sup > config.max_batch_size_sup {
            return Err(BenchmarkError::invalid_bounds(format!(
                "batch_size upper bound {} exceeds the limit of {}",
                self.batch_size_sup, config.max_batch_size_sup
            )));
        }
        if self.concurrency_sup > config.max_concurrency_sup as u64 {
            return Err(BenchmarkError::invalid_bounds(format!(
                "concurrency upper bound {} exceeds the limit of {}",
                self.concurrency_sup, config.max_concurrency_sup
            )));
        }
        Ok(())
    }
}

/// Clears the running flag when the sweep task ends, however it ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct BenchmarkController {
    target: Arc<dyn BenchmarkTarget>,
    config: BenchmarkConfig,
    context: Arc<ContextStore>,
    signal: StopSignal,
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<BenchmarkStatus>>>,
}

impl BenchmarkController {
    pub fn new(target: Arc<dyn BenchmarkTarget>, config: BenchmarkConfig) -> Self {
        Self {
            context: Arc::new(ContextStore::new(config.context_path.clone())),
            signal: StopSignal::new(config.stop_flag_path.clone()),
            target,
            config,
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn context_store(&self) -> &Arc<ContextStore> {
        &self.context
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Validate `request` and launch the sweep in the background
    #[instrument(skip(self), fields(dataset = %request.dataset_name))]
    pub async fn start(&self, request: BenchmarkRequest) -> TriageResult<BenchmarkContext> {
        request.validate(&self.config)?;

        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BenchmarkError::AlreadyRunning.into());
        }
        let guard = RunningGuard(self.running.clone());

        let total_rows = self
            .target
            .dataset_rows(&request.dataset_name)
            .await
            .map_err(|e| match e {
                e if e.is_not_found() => e,
                e => BenchmarkError::target(format!("reading dataset metadata: {e}")).into(),
            })?;
        self.signal.clear().await;

        let context = BenchmarkContext {
            dataset_name: request.dataset_name.clone(),
            total_rows,
            batch_size: SweepPosition::new(
                request.batch_size_inf,
                request.batch_size_sup.min(total_rows),
            ),
            batch_size_step: request.batch_size_step,
            concurrency: SweepPosition::new(request.concurrency_inf, request.concurrency_sup),
            concurrency_step: request.concurrency_step,
            last_action: None,
            status: BenchmarkStatus::Running,
            message: None,
            runs: Vec::new(),
            last_updated: Utc::now(),
        };
        self.context.persist(&context).await?;

        log_benchmark_operation(
            "start",
            &request.dataset_name,
            Some(request.batch_size_inf),
            Some(request.concurrency_inf as usize),
            "running",
            Some(&format!("{total_rows} rows")),
        );

        let sweep = Sweep {
            target: self.target.clone(),
            store: self.context.clone(),
            signal: self.signal.clone(),
            backoff: BackoffPolicy::for_polling(&self.config),
            max_poll_attempts: self.config.max_poll_attempts,
            cooldown: self.config.inter_run_cooldown(),
            request,
            context: context.clone(),
        };
        let handle = tokio::spawn(async move {
            let _guard = guard;
            sweep.run().await
        });
        *self.handle.lock() = Some(handle);

        Ok(context)
    }

    /// Ask the running sweep to stop at its next check; returns whether one was running
    pub async fn stop(&self) -> bool {
        let running = self.is_running();
        if running {
            self.signal.raise().await;
            info!("🛑 BENCHMARK: Stop requested");
        }
        running
    }

    pub fn status(&self) -> Option<BenchmarkContext> {
        self.context.current()
    }

    /// Wait for the current sweep to finish and return its final status
    pub async fn wait(&self) -> Option<BenchmarkStatus> {
        let handle = self.handle.lock().take()?;
        match handle.await {
            Ok(status) => Some(status),
            Err(e) => {
                log_error("benchmark_controller", "wait", &e.to_string(), None);
                Some(BenchmarkStatus::Error)
            }
        }
    }
}

enum PollResult {
    Completed { attempts: u32 },
    Exhausted { attempts: u32 },
    Aborted { attempts: u32 },
}

/// One sweep's state, owned by the background task
struct Sweep {
    target: Arc<dyn BenchmarkTarget>,
    store: Arc<ContextStore>,
    signal: StopSignal,
    backoff: BackoffPolicy,
    max_poll_attempts: u32,
    cooldown: std::time::Duration,
    request: BenchmarkRequest,
    context: BenchmarkContext,
}

impl Sweep {
    async fn run(mut self) -> BenchmarkStatus {
        let backup = self.target.current_settings();
        let dataset = self.request.dataset_name.clone();

        let batch_sizes = sweep_values(
            self.request.batch_size_inf,
            self.context.batch_size.sup,
            self.request.batch_size_step,
        );
        let concurrencies = sweep_values(
            self.request.concurrency_inf,
            self.request.concurrency_sup,
            self.request.concurrency_step,
        );
        let total_points = batch_sizes.len() * concurrencies.len();
        let mut point = 0;

        for &batch_size in &batch_sizes {
            for &concurrency in &concurrencies {
                point += 1;
                if self.signal.is_raised().await {
                    return self.abort(backup).await;
                }

                self.context.batch_size.current = batch_size;
                self.context.concurrency.current = concurrency;
                self.context.status = BenchmarkStatus::Running;
                self.transition("apply_settings").await;

                let settings = ProcessingSettings {
                    batch_size,
                    max_concurrent_requests: concurrency as usize,
                };
                let started_at = Utc::now();
                let clock = Instant::now();

                if let Err(e) = self.target.apply_settings(settings).await {
                    return self
                        .fail(backup, format!("applying {settings:?} failed: {e}"))
                        .await;
                }

                self.transition("analyze").await;
                if let Err(e) = self.target.start_run(&dataset).await {
                    self.record(settings, started_at, clock, RunOutcome::Failed, 0);
                    return self.fail(backup, format!("starting analysis failed: {e}")).await;
                }

                self.context.status = BenchmarkStatus::Polling;
                self.transition("poll_status").await;

                match self.poll(&dataset).await {
                    PollResult::Completed { attempts } => {
                        self.record(settings, started_at, clock, RunOutcome::Completed, attempts);
                        log_benchmark_operation(
                            "grid_point",
                            &dataset,
                            Some(batch_size),
                            Some(concurrency as usize),
                            "completed",
                            Some(&format!("{point}/{total_points}")),
                        );
                    }
                    PollResult::Exhausted { attempts } => {
                        self.record(settings, started_at, clock, RunOutcome::TimedOut, attempts);
                        return self
                            .fail(
                                backup,
                                format!("run did not complete within {attempts} poll attempts"),
                            )
                            .await;
                    }
                    PollResult::Aborted { attempts } => {
                        self.record(settings, started_at, clock, RunOutcome::Aborted, attempts);
                        return self.abort(backup).await;
                    }
                }

                self.context.status = BenchmarkStatus::Running;
                self.transition("run_completed").await;

                if point < total_points {
                    debug!(cooldown_secs = self.cooldown.as_secs(), "Cooling down before next grid point");
                    if self.signal.sleep(self.cooldown).await {
                        return self.abort(backup).await;
                    }
                }
            }
        }

        self.restore(backup).await;
        self.context.status = BenchmarkStatus::Completed;
        self.transition("completed").await;
        log_benchmark_operation("finish", &dataset, None, None, "completed", None);
        BenchmarkStatus::Completed
    }

    async fn poll(&self, dataset: &str) -> PollResult {
        let mut attempts = 0u32;
        let mut total_attempts = 0u32;
        let mut last_fraction = -1.0f64;

        loop {
            if self.signal.is_raised().await {
                return PollResult::Aborted { attempts: total_attempts };
            }

            match self.target.run_status(dataset).await {
                Ok(status) if status.state == RunState::Completed => {
                    return PollResult::Completed { attempts: total_attempts };
                }
                Ok(status) => {
                    if status.completion_fraction > last_fraction {
                        // progress since the last poll restarts the attempt budget
                        last_fraction = status.completion_fraction;
                        attempts = 0;
                    }
                    debug!(
                        fraction = status.completion_fraction,
                        state = ?status.state,
                        "Waiting for batch results"
                    );
                }
                Err(e) => {
                    warn!(error = %e, attempt = attempts + 1, "Status query failed");
                }
            }

            if attempts >= self.max_poll_attempts {
                return PollResult::Exhausted { attempts: total_attempts };
            }

            let delay = self.backoff.delay_for(attempts);
            attempts += 1;
            total_attempts += 1;
            if self.signal.sleep(delay).await {
                return PollResult::Aborted { attempts: total_attempts };
            }
        }
    }

    fn record(
        &mut self,
        settings: ProcessingSettings,
        started_at: chrono::DateTime<Utc>,
        clock: Instant,
        outcome: RunOutcome,
        poll_attempts: u32,
    ) {
        self.context.runs.push(RunRecord {
            batch_size: settings.batch_size,
            concurrency: settings.max_concurrent_requests,
            started_at,
            finished_at: Utc::now(),
            elapsed_sec: clock.elapsed().as_secs_f64(),
            outcome,
            poll_attempts,
        });
    }

    async fn transition(&mut self, action: &str) {
        self.context.last_action = Some(action.to_string());
        self.context.touch();
        if let Err(e) = self.store.persist(&self.context).await {
            log_error("benchmark_controller", "persist_context", &e.to_string(), Some(action));
        }
    }

    async fn restore(&self, backup: ProcessingSettings) {
        if let Err(e) = self.target.apply_settings(backup).await {
            log_error(
                "benchmark_controller",
                "restore_settings",
                &e.to_string(),
                Some(&format!("{backup:?}")),
            );
        }
    }

    async fn abort(mut self, backup: ProcessingSettings) -> BenchmarkStatus {
        warn!(dataset = %self.request.dataset_name, "⏹️ BENCHMARK: Stop signal detected, aborting");
        self.signal.clear().await;
        self.restore(backup).await;
        self.context.status = BenchmarkStatus::Aborted;
        self.transition("aborted").await;
        BenchmarkStatus::Aborted
    }

    async fn fail(mut self, backup: ProcessingSettings, message: String) -> BenchmarkStatus {
        log_error(
            "benchmark_controller",
            "sweep",
            &message,
            Some(&self.request.dataset_name),
        );
        self.restore(backup).await;
        self.context.status = BenchmarkStatus::Error;
        self.context.message = Some(message);
        self.transition("error").await;
        BenchmarkStatus::Error
    }
}
