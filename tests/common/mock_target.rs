//! In-memory benchmark target with scripted run completion.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use triage_core::benchmark::{BenchmarkTarget, StopSignal};
use triage_core::orchestration::{BatchResultsStatus, ProcessingSettings, RunState};
use triage_core::{TriageError, TriageResult};

#[derive(Debug)]
struct MockTargetState {
    settings: ProcessingSettings,
    applied: Vec<ProcessingSettings>,
    runs: Vec<ProcessingSettings>,
    /// Status polls served for the current run
    polls_this_run: u32,
}

/// Scripted pipeline: each run completes after a fixed number of polls
#[derive(Debug, Clone)]
pub struct MockBenchmarkTarget {
    dataset_name: String,
    rows: u64,
    /// `None` means runs never complete
    polls_until_complete: Option<u32>,
    /// Raise this signal when the given (1-based) run starts
    stop_on_run: Option<(usize, StopSignal)>,
    state: Arc<Mutex<MockTargetState>>,
}

impl MockBenchmarkTarget {
    pub fn new(dataset_name: &str, rows: u64, initial: ProcessingSettings) -> Self {
        Self {
            dataset_name: dataset_name.to_string(),
            rows,
            polls_until_complete: Some(1),
            stop_on_run: None,
            state: Arc::new(Mutex::new(MockTargetState {
                settings: initial,
                applied: Vec::new(),
                runs: Vec::new(),
                polls_this_run: 0,
            })),
        }
    }

    pub fn completing_after(mut self, polls: u32) -> Self {
        self.polls_until_complete = Some(polls);
        self
    }

    pub fn never_completing(mut self) -> Self {
        self.polls_until_complete = None;
        self
    }

    pub fn raising_stop_on_run(mut self, run: usize, signal: StopSignal) -> Self {
        self.stop_on_run = Some((run, signal));
        self
    }

    pub fn settings(&self) -> ProcessingSettings {
        self.state.lock().settings
    }

    pub fn applied(&self) -> Vec<ProcessingSettings> {
        self.state.lock().applied.clone()
    }

    /// Settings in effect for each started run
    pub fn runs(&self) -> Vec<ProcessingSettings> {
        self.state.lock().runs.clone()
    }
}

#[async_trait]
impl BenchmarkTarget for MockBenchmarkTarget {
    fn current_settings(&self) -> ProcessingSettings {
        self.state.lock().settings
    }

    async fn apply_settings(&self, settings: ProcessingSettings) -> TriageResult<()> {
        let mut state = self.state.lock();
        state.settings = settings;
        state.applied.push(settings);
        Ok(())
    }

    async fn dataset_rows(&self, dataset_name: &str) -> TriageResult<u64> {
        if dataset_name != self.dataset_name {
            return Err(TriageError::not_found(format!("dataset '{dataset_name}'")));
        }
        Ok(self.rows)
    }

    async fn start_run(&self, _dataset_name: &str) -> TriageResult<()> {
        let run_number = {
            let mut state = self.state.lock();
            let settings = state.settings;
            state.runs.push(settings);
            state.polls_this_run = 0;
            state.runs.len()
        };
        if let Some((target_run, signal)) = &self.stop_on_run {
            if *target_run == run_number {
                signal.raise().await;
            }
        }
        Ok(())
    }

    async fn run_status(&self, dataset_name: &str) -> TriageResult<BatchResultsStatus> {
        let mut state = self.state.lock();
        state.polls_this_run += 1;
        let completed = self
            .polls_until_complete
            .is_some_and(|needed| state.polls_this_run >= needed);

        Ok(BatchResultsStatus {
            dataset_name: dataset_name.to_string(),
            expected_batches: 4,
            result_artifacts: if completed { 4 } else { 0 },
            metrics_artifacts: if completed { 4 } else { 0 },
            completion_fraction: if completed { 1.0 } else { 0.0 },
            state: if completed {
                RunState::Completed
            } else {
                RunState::InProgress
            },
        })
    }
}
