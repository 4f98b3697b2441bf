//! Batch processor behaviour against an in-memory store and a mock model.

mod common;

use common::*;
use std::time::Duration;
use triage_core::constants::JSONL_CONTENT_TYPE;
use triage_core::models::{BatchDescriptor, BatchJob, BatchMetrics, ClassificationResult, ThreatClass};
use triage_core::orchestration::{BatchRunner, TaskQueue};
use triage_core::storage::ObjectStore;
use triage_core::TriageError;

async fn seed_dataset(pipeline: &Pipeline, name: &str, rows: usize) -> String {
    let path = pipeline.paths.dataset(name);
    pipeline
        .store
        .put(&path, alerts_jsonl(rows), JSONL_CONTENT_TYPE)
        .await
        .unwrap();
    path
}

fn job(name: &str, path: &str, batch_id: u64, start_row: u64, end_row: u64) -> BatchJob {
    BatchJob::new(
        name,
        path,
        end_row - start_row,
        &BatchDescriptor {
            batch_id,
            start_row,
            end_row,
        },
    )
}

async fn read_results(pipeline: &Pipeline, name: &str, batch_id: u64) -> Vec<ClassificationResult> {
    let data = pipeline
        .store
        .get(&pipeline.paths.batch_result(name, batch_id))
        .await
        .unwrap();
    String::from_utf8(data)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

async fn read_metrics(pipeline: &Pipeline, name: &str, batch_id: u64) -> BatchMetrics {
    let data = pipeline
        .store
        .get(&pipeline.paths.batch_metrics(name, batch_id))
        .await
        .unwrap();
    serde_json::from_slice(data.strip_suffix(b"\n").unwrap_or(&data)).unwrap()
}

#[tokio::test]
async fn test_batch_writes_results_in_record_order() {
    let generator = MockTextGenerator::new()
        .with_latency(Duration::from_millis(5))
        .when_prompt_contains("alert-0005", MockBehavior::Reply(THREAT_REPLY.to_string()));
    let pipeline = PipelineBuilder::new().with_generator(generator).build();
    let path = seed_dataset(&pipeline, "alerts", 10).await;

    let outcome = pipeline
        .processor
        .process(&job("alerts", &path, 1, 4, 8))
        .await
        .unwrap();

    let results = read_results(&pipeline, "alerts", 1).await;
    let ids: Vec<u64> = results.iter().map(|r| r.record_id).collect();
    assert_eq!(ids, vec![4, 5, 6, 7]);
    assert_eq!(results[1].class, ThreatClass::RealThreat);
    assert_eq!(results[1].explanation, "outbound beacon to known C2");
    assert!(results
        .iter()
        .filter(|r| r.record_id != 5)
        .all(|r| r.class == ThreatClass::FalsePositive));

    assert_eq!(outcome.metrics.batch_size, 4);
    assert_eq!(outcome.metrics.max_concurrency, 3);
    assert_eq!(outcome.metrics.concurrency_used, 3);
    let stored = read_metrics(&pipeline, "alerts", 1).await;
    assert_eq!(stored.batch_id, 1);
    assert_eq!(stored.classified_count, 4);
    assert_eq!(stored.started_at, outcome.metrics.started_at);
}

#[tokio::test]
async fn test_classifying_same_records_twice_calls_model_once() {
    let pipeline = PipelineBuilder::new().build();
    let path = seed_dataset(&pipeline, "alerts", 4).await;
    let batch = job("alerts", &path, 0, 0, 4);

    let first = pipeline.processor.process(&batch).await.unwrap();
    let first_results = read_results(&pipeline, "alerts", 0).await;
    assert_eq!(pipeline.generator.call_count(), 4);
    assert_eq!(first.metrics.cache_hits, 0);

    let second = pipeline.processor.process(&batch).await.unwrap();
    let second_results = read_results(&pipeline, "alerts", 0).await;

    assert_eq!(pipeline.generator.call_count(), 4, "second pass must be served from cache");
    assert_eq!(second.metrics.cache_hits, 4);
    assert_eq!(first_results, second_results);
    assert!(second_results.iter().all(|r| r.cached));
}

#[tokio::test]
async fn test_single_timeout_is_isolated_to_its_record() {
    let generator = MockTextGenerator::new()
        .when_prompt_contains("alert-0002", MockBehavior::Delay(Duration::from_secs(30)));
    let pipeline = PipelineBuilder::new()
        .with_generator(generator)
        .with_classifier_timeout(Duration::from_millis(200))
        .build();
    let path = seed_dataset(&pipeline, "alerts", 6).await;

    let outcome = pipeline
        .processor
        .process(&job("alerts", &path, 0, 0, 6))
        .await
        .unwrap();
    let results = read_results(&pipeline, "alerts", 0).await;

    assert_eq!(results.len(), 6);
    let errors: Vec<&ClassificationResult> = results.iter().filter(|r| r.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].record_id, 2);
    assert!(errors[0].explanation.starts_with("Timeout"));

    assert_eq!(outcome.metrics.error_count, 1);
    assert_eq!(outcome.metrics.timeout_count, 1);
    assert_eq!(outcome.metrics.classified_count, 5);
}

#[tokio::test]
async fn test_generation_failures_become_error_results() {
    let generator = MockTextGenerator::new()
        .when_prompt_contains("alert-0000", MockBehavior::Fail("quota exceeded".to_string()))
        .when_prompt_contains("alert-0001", MockBehavior::Reply("I cannot decide".to_string()));
    let pipeline = PipelineBuilder::new().with_generator(generator).build();
    let path = seed_dataset(&pipeline, "alerts", 3).await;

    let outcome = pipeline
        .processor
        .process(&job("alerts", &path, 0, 0, 3))
        .await
        .unwrap();
    let results = read_results(&pipeline, "alerts", 0).await;

    assert!(results[0].is_error());
    assert!(results[0].explanation.contains("quota exceeded"));
    assert!(results[1].is_error());
    assert!(results[1].explanation.starts_with("invalid output: "));
    assert_eq!(results[2].class, ThreatClass::FalsePositive);
    assert_eq!(outcome.metrics.timeout_count, 0);

    // failed records are not cached, so a retry asks the model again
    pipeline
        .processor
        .process(&job("alerts", &path, 0, 0, 3))
        .await
        .unwrap();
    assert_eq!(pipeline.generator.calls_containing("alert-0000"), 2);
    assert_eq!(pipeline.generator.calls_containing("alert-0002"), 1);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_cap() {
    let generator = MockTextGenerator::new().with_latency(Duration::from_millis(20));
    let pipeline = PipelineBuilder::new()
        .with_generator(generator)
        .configure(|c| c.processing.max_concurrent_requests = 2)
        .build();
    let path = seed_dataset(&pipeline, "alerts", 8).await;

    let outcome = pipeline
        .processor
        .process(&job("alerts", &path, 0, 0, 8))
        .await
        .unwrap();

    assert_eq!(outcome.metrics.concurrency_used, 2);
    assert!(pipeline.generator.peak_concurrency() <= 2);
    assert_eq!(pipeline.generator.call_count(), 8);
}

#[tokio::test]
async fn test_missing_dataset_fails_the_batch() {
    let pipeline = PipelineBuilder::new().build();
    let err = pipeline
        .processor
        .process(&job("ghost", "datasets/ghost.jsonl", 0, 0, 2))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(!pipeline
        .store
        .exists(&pipeline.paths.batch_result("ghost", 0))
        .await
        .unwrap());
}

async fn assert_rejected_without_artifacts(pipeline: &Pipeline, bad: &BatchJob) {
    let err = pipeline.processor.process(bad).await.unwrap_err();
    assert!(
        matches!(err, TriageError::Validation(_)),
        "{bad:?} should be rejected, got {err:?}"
    );
    for path in [
        pipeline.paths.batch_result(&bad.dataset_name, bad.batch_id),
        pipeline.paths.batch_metrics(&bad.dataset_name, bad.batch_id),
    ] {
        assert!(!pipeline.store.exists(&path).await.unwrap(), "{path} was written");
    }
}

#[tokio::test]
async fn test_oversized_or_inconsistent_ranges_are_rejected() {
    let pipeline = PipelineBuilder::new().build();
    let path = seed_dataset(&pipeline, "alerts", 2).await;

    let mut unbounded = job("alerts", &path, 0, 0, 2);
    unbounded.end_row = u64::MAX;
    assert_rejected_without_artifacts(&pipeline, &unbounded).await;

    let mut huge = job("alerts", &path, 0, 0, 2);
    huge.end_row = u64::MAX;
    huge.batch_size = u64::MAX;
    assert_rejected_without_artifacts(&pipeline, &huge).await;

    let mut inverted = job("alerts", &path, 0, 0, 2);
    inverted.start_row = 3;
    assert_rejected_without_artifacts(&pipeline, &inverted).await;

    assert_eq!(pipeline.generator.call_count(), 0);
}

#[tokio::test]
async fn test_job_paths_are_derived_from_the_dataset_name() {
    let pipeline = PipelineBuilder::new().build();
    seed_dataset(&pipeline, "alerts", 4).await;
    pipeline
        .store
        .put("config.json", b"{\"id\":1}\n".to_vec(), JSONL_CONTENT_TYPE)
        .await
        .unwrap();

    assert_rejected_without_artifacts(&pipeline, &job("alerts", "config.json", 0, 0, 1)).await;
    assert_rejected_without_artifacts(&pipeline, &job("../alerts", "datasets/alerts.jsonl", 0, 0, 1))
        .await;
    assert_rejected_without_artifacts(&pipeline, &job("a/b", "datasets/a/b.jsonl", 0, 0, 1)).await;
    assert_eq!(pipeline.generator.call_count(), 0);
}

#[tokio::test]
async fn test_local_queue_runs_every_enqueued_batch() {
    let pipeline = PipelineBuilder::new().build();
    let path = seed_dataset(&pipeline, "alerts", 10).await;

    for (batch_id, start, end) in [(0, 0, 4), (1, 4, 8), (2, 8, 10)] {
        pipeline
            .queue
            .enqueue(job("alerts", &path, batch_id, start, end))
            .await
            .unwrap();
    }
    pipeline.queue.wait_idle().await;

    for batch_id in 0..3 {
        assert!(pipeline
            .store
            .exists(&pipeline.paths.batch_metrics("alerts", batch_id))
            .await
            .unwrap());
    }
    assert_eq!(read_results(&pipeline, "alerts", 2).await.len(), 2);
    assert_eq!(pipeline.generator.call_count(), 10);

    // the processor is also reachable through the runner seam used by /run-batch
    let runner: &dyn BatchRunner = pipeline.processor.as_ref();
    let outcome = runner.run_batch(&job("alerts", &path, 2, 8, 10)).await.unwrap();
    assert_eq!(outcome.metrics.cache_hits, 2);
}
