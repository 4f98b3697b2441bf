//! # Bounded-Concurrency Batch Processor
//!
//! Processes one [`BatchJob`]: streams its rows, classifies each record under a
//! per-batch semaphore, consults and fills the classification cache, and
//! writes the batch-result and batch-metrics artifacts. Writing both artifacts
//! is the batch's completion signal; anything that fails before that is
//! returned as an error so the queue can redeliver the job.
//!
//! Per-record failures never fail the batch: a timed-out or unparseable
//! classification becomes a `class = "error"` result for that record.
//!
//! ## Lifecycle
//!
//! `received → classifying → writing-results → done | failed`

use super::memory::MemorySampler;
use super::row_stream::RowStream;
use super::settings::SettingsHandle;
use crate::cache::ClassificationCache;
use crate::classifier::{ClassificationError, ClassifierClient};
use crate::config::{CacheConfig, ProcessingConfig};
use crate::constants::JSONL_CONTENT_TYPE;
use crate::error::{TriageError, TriageResult};
use crate::logging::log_batch_operation;
use crate::models::{
    BatchJob, BatchMetrics, BatchTally, ClassificationResult, Record,
};
use crate::storage::{ArtifactPaths, ObjectStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Received,
    Classifying,
    WritingResults,
    Done,
    Failed,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatchState::Received => "received",
            BatchState::Classifying => "classifying",
            BatchState::WritingResults => "writing_results",
            BatchState::Done => "done",
            BatchState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What a finished batch produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub dataset_name: String,
    pub batch_id: u64,
    pub result_path: String,
    pub metrics_path: String,
    pub metrics: BatchMetrics,
}

/// Anything that can run a batch to completion; the task queue's view of the processor
#[async_trait]
pub trait BatchRunner: Send + Sync {
    async fn run_batch(&self, job: &BatchJob) -> TriageResult<BatchOutcome>;
}

/// `max(1, min(batch_len, max_concurrent_requests))`
pub fn effective_concurrency(batch_len: usize, max_concurrent_requests: usize) -> usize {
    batch_len.min(max_concurrent_requests).max(1)
}

struct RecordOutcome {
    result: ClassificationResult,
    timed_out: bool,
}

pub struct BatchProcessor {
    store: Arc<dyn ObjectStore>,
    paths: ArtifactPaths,
    cache: Arc<ClassificationCache>,
    classifier: Arc<ClassifierClient>,
    settings: Arc<SettingsHandle>,
    processing: ProcessingConfig,
    cache_config: CacheConfig,
}

impl BatchProcessor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        paths: ArtifactPaths,
        cache: Arc<ClassificationCache>,
        classifier: Arc<ClassifierClient>,
        settings: Arc<SettingsHandle>,
        processing: ProcessingConfig,
        cache_config: CacheConfig,
    ) -> Self {
        Self {
            store,
            paths,
            cache,
            classifier,
            settings,
            processing,
            cache_config,
        }
    }

    #[instrument(skip(self, job), fields(dataset = %job.dataset_name, batch_id = job.batch_id))]
    pub async fn process(&self, job: &BatchJob) -> TriageResult<BatchOutcome> {
        log_batch_operation("process", &job.dataset_name, Some(job.batch_id), &BatchState::Received.to_string(), None);

        match self.run(job).await {
            Ok(outcome) => {
                log_batch_operation(
                    "process",
                    &job.dataset_name,
                    Some(job.batch_id),
                    &BatchState::Done.to_string(),
                    None,
                );
                Ok(outcome)
            }
            Err(e) => {
                log_batch_operation(
                    "process",
                    &job.dataset_name,
                    Some(job.batch_id),
                    &BatchState::Failed.to_string(),
                    Some(&e.to_string()),
                );
                Err(e)
            }
        }
    }

    async fn run(&self, job: &BatchJob) -> TriageResult<BatchOutcome> {
        job.validate()?;
        ArtifactPaths::validate_dataset_name(&job.dataset_name)?;
        let dataset_path = self.paths.dataset(&job.dataset_name);
        if job.dataset_path != dataset_path {
            return Err(TriageError::validation(format!(
                "batch {} points at '{}', expected '{}'",
                job.batch_id, job.dataset_path, dataset_path
            )));
        }

        if self.cache.is_enabled() {
            if let Err(e) = self.cache.sweep_if_over(self.cache_config.sweep_threshold).await {
                warn!(error = %e, "Opportunistic cache sweep failed");
            }
        }

        let mut rows = RowStream::open(
            self.store.clone(),
            &dataset_path,
            self.processing.chunk_size_bytes,
        )
        .await?;
        let records = rows.read_rows(job.start_row, job.end_row).await?;

        let max_concurrency = self.settings.current().max_concurrent_requests;
        let concurrency_used = effective_concurrency(records.len(), max_concurrency);

        debug!(
            records = records.len(),
            max_concurrency,
            concurrency_used,
            state = %BatchState::Classifying,
            "Classifying batch"
        );

        let sampler = MemorySampler::start(self.processing.memory_sample_interval());
        let started_at = Utc::now();
        let clock = Instant::now();

        let classified = self
            .classify_all(job.start_row, records, concurrency_used)
            .await;
        let elapsed_sec = clock.elapsed().as_secs_f64();
        let ram_mb = sampler.finish().await;
        let outcomes = classified?;

        let mut tally = BatchTally::default();
        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            tally.records += 1;
            if outcome.result.is_error() {
                tally.errors += 1;
            }
            if outcome.timed_out {
                tally.timeouts += 1;
            }
            if outcome.result.cached {
                tally.cache_hits += 1;
            }
            results.push(outcome.result);
        }
        results.sort_by_key(|r| r.record_id);

        let metrics = BatchMetrics::from_tally(
            job.batch_id,
            tally,
            max_concurrency,
            concurrency_used,
            started_at,
            elapsed_sec,
            ram_mb,
        );

        debug!(state = %BatchState::WritingResults, "Writing batch artifacts");
        let result_path = self.paths.batch_result(&job.dataset_name, job.batch_id);
        let metrics_path = self.paths.batch_metrics(&job.dataset_name, job.batch_id);

        self.store
            .put(&result_path, to_jsonl(&results)?, JSONL_CONTENT_TYPE)
            .await?;
        self.store
            .put(&metrics_path, to_jsonl(std::slice::from_ref(&metrics))?, JSONL_CONTENT_TYPE)
            .await?;

        info!(
            records = tally.records,
            errors = tally.errors,
            timeouts = tally.timeouts,
            cache_hits = tally.cache_hits,
            elapsed_sec,
            ram_mb,
            "✅ BATCH: Artifacts written"
        );

        Ok(BatchOutcome {
            dataset_name: job.dataset_name.clone(),
            batch_id: job.batch_id,
            result_path,
            metrics_path,
            metrics,
        })
    }

    /// Fan out one task per record; every task is joined before returning
    async fn classify_all(
        &self,
        start_row: u64,
        records: Vec<Record>,
        concurrency: usize,
    ) -> TriageResult<Vec<RecordOutcome>> {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();

        for (index, record) in records.into_iter().enumerate() {
            let record_id = start_row + index as u64;
            let cache = self.cache.clone();
            let classifier = self.classifier.clone();
            let semaphore = semaphore.clone();
            let timestamp_field = self.processing.timestamp_field.clone();

            tasks.spawn(async move {
                classify_record(record_id, record, &timestamp_field, cache, classifier, semaphore)
                    .await
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        let mut panicked = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(error = %e, "Record task did not complete");
                    panicked.get_or_insert_with(|| e.to_string());
                }
            }
        }

        match panicked {
            Some(reason) => Err(TriageError::internal(format!(
                "record task failed: {reason}"
            ))),
            None => Ok(outcomes),
        }
    }
}

async fn classify_record(
    record_id: u64,
    record: Record,
    timestamp_field: &str,
    cache: Arc<ClassificationCache>,
    classifier: Arc<ClassifierClient>,
    semaphore: Arc<Semaphore>,
) -> RecordOutcome {
    let timestamp = record.timestamp(timestamp_field);
    let record_hash = record.content_hash();

    match cache.get(&record_hash).await {
        Ok(Some(entry)) => {
            debug!(record_id, "Cache hit");
            return RecordOutcome {
                result: ClassificationResult::from_classification(
                    record_id,
                    timestamp,
                    entry.classification(),
                    true,
                ),
                timed_out: false,
            };
        }
        Ok(None) => {}
        Err(e) => warn!(record_id, error = %e, "Cache read failed; treating as miss"),
    }

    let _permit = match semaphore.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            return RecordOutcome {
                result: ClassificationResult::error(record_id, timestamp, e.to_string()),
                timed_out: false,
            }
        }
    };

    match classifier.classify(&record).await {
        Ok(classification) => {
            if let Err(e) = cache.put(&record_hash, &classification).await {
                warn!(record_id, error = %e, "Cache write failed");
            }
            RecordOutcome {
                result: ClassificationResult::from_classification(
                    record_id,
                    timestamp,
                    classification,
                    false,
                ),
                timed_out: false,
            }
        }
        Err(e) => {
            debug!(record_id, error = %e, "Record classification failed");
            RecordOutcome {
                timed_out: matches!(e, ClassificationError::Timeout { .. }),
                result: ClassificationResult::error(record_id, timestamp, e.to_string()),
            }
        }
    }
}

fn to_jsonl<T: Serialize>(items: &[T]) -> TriageResult<Vec<u8>> {
    let mut out = Vec::new();
    for item in items {
        serde_json::to_writer(&mut out, item)?;
        out.push(b'\n');
    }
    Ok(out)
}

#[async_trait]
impl BatchRunner for BatchProcessor {
    async fn run_batch(&self, job: &BatchJob) -> TriageResult<BatchOutcome> {
        self.process(job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_concurrency() {
        assert_eq!(effective_concurrency(0, 16), 1);
        assert_eq!(effective_concurrency(3, 16), 3);
        assert_eq!(effective_concurrency(500, 16), 16);
        assert_eq!(effective_concurrency(500, 1), 1);
    }

    #[test]
    fn test_jsonl_encoding() {
        let results = vec![
            ClassificationResult::error(0, "n/a".into(), "a"),
            ClassificationResult::error(1, "n/a".into(), "b"),
        ];
        let bytes = to_jsonl(&results).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with('\n'));
    }
}
