//! At-most-once merge under concurrent and duplicate storage notifications.

mod common;

use chrono::Utc;
use common::*;
use std::sync::Arc;
use std::time::Duration;
use triage_core::constants::JSONL_CONTENT_TYPE;
use triage_core::models::{DatasetMetadata, ThreatClass};
use triage_core::orchestration::{
    AnalysisService, LockState, MergeCoordinator, MergeOutcome, NotificationDispatcher, RunState,
};
use triage_core::storage::{
    put_json, ArtifactPaths, InMemoryObjectStore, NotifyingObjectStore, ObjectStore,
    StorageNotification,
};

const BUCKET: &str = "main-asset-storage";

fn paths() -> ArtifactPaths {
    ArtifactPaths::new(Default::default())
}

async fn seed_metadata(store: &dyn ObjectStore, paths: &ArtifactPaths, name: &str, num_batches: u64) {
    let metadata = DatasetMetadata {
        dataset_name: name.to_string(),
        dataset_path: paths.dataset(name),
        num_rows: num_batches * 2,
        num_columns: 1,
        features: vec!["name".to_string()],
        batch_size: 2,
        num_batches,
        uploaded_at: Utc::now(),
    };
    put_json(store, &paths.metadata(name), &metadata).await.unwrap();
}

async fn seed_batch(store: &dyn ObjectStore, paths: &ArtifactPaths, name: &str, batch_id: u64) {
    let results = format!(
        "{{\"record_id\":{},\"timestamp\":\"n/a\",\"class\":\"false_positive\",\"explanation\":\"ok\"}}\n\
         {{\"record_id\":{},\"timestamp\":\"n/a\",\"class\":\"real_threat\",\"explanation\":\"bad\"}}\n",
        batch_id * 2,
        batch_id * 2 + 1
    );
    store
        .put(&paths.batch_result(name, batch_id), results.into_bytes(), JSONL_CONTENT_TYPE)
        .await
        .unwrap();
    store
        .put(
            &paths.batch_metrics(name, batch_id),
            format!("{{\"batch_id\":{batch_id}}}\n").into_bytes(),
            JSONL_CONTENT_TYPE,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrent_notifications_merge_exactly_once() {
    let recording = Arc::new(RecordingObjectStore::new(Arc::new(InMemoryObjectStore::new())));
    let store: Arc<dyn ObjectStore> = recording.clone();
    let paths = paths();
    seed_metadata(store.as_ref(), &paths, "alerts", 3).await;
    for batch_id in 0..3 {
        seed_batch(store.as_ref(), &paths, "alerts", batch_id).await;
    }

    let coordinator = Arc::new(MergeCoordinator::new(store.clone(), paths.clone()));
    let mut handles = Vec::new();
    for i in 0..24u64 {
        let coordinator = coordinator.clone();
        let notification = if i % 2 == 0 {
            StorageNotification::new(BUCKET, paths.batch_result("alerts", i % 3))
        } else {
            StorageNotification::new(BUCKET, paths.batch_metrics("alerts", i % 3))
        };
        handles.push(tokio::spawn(async move {
            coordinator.handle_notification(&notification).await.unwrap()
        }));
    }

    let mut merged = 0;
    for handle in handles {
        match handle.await.unwrap() {
            MergeOutcome::Merged { record_count, batch_count, .. } => {
                merged += 1;
                assert_eq!(record_count, 6);
                assert_eq!(batch_count, 3);
            }
            MergeOutcome::AlreadyClaimed => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(merged, 1);
    let lock_path = paths.merge_lock("alerts");
    assert_eq!(recording.conditional_creates(&lock_path), 1);
    assert_eq!(recording.puts(&paths.merged_result("alerts")), 1);
    assert_eq!(recording.puts(&paths.merged_metrics("alerts")), 1);
    assert!(matches!(
        coordinator.read_lock("alerts").await.unwrap(),
        LockState::Merged { record_count: 6, batch_count: 3, .. }
    ));

    let merged_body = String::from_utf8(store.get(&paths.merged_result("alerts")).await.unwrap()).unwrap();
    let ids: Vec<u64> = merged_body
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["record_id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_incomplete_runs_do_not_merge() {
    let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
    let paths = paths();
    let coordinator = MergeCoordinator::new(store.clone(), paths.clone());

    assert_eq!(coordinator.try_merge("alerts").await.unwrap(), MergeOutcome::NotReady);

    seed_metadata(store.as_ref(), &paths, "alerts", 3).await;
    seed_batch(store.as_ref(), &paths, "alerts", 0).await;
    seed_batch(store.as_ref(), &paths, "alerts", 2).await;
    // a stale artifact from a run with more batches must not count
    seed_batch(store.as_ref(), &paths, "alerts", 7).await;

    let outcome = coordinator
        .handle_notification(&StorageNotification::new(BUCKET, paths.batch_result("alerts", 2)))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Partial {
            expected: 3,
            result_artifacts: 2,
            metrics_artifacts: 2,
        }
    );
    assert_eq!(coordinator.read_lock("alerts").await.unwrap(), LockState::NoLock);

    let status = coordinator.status("alerts").await.unwrap();
    assert_eq!(status.state, RunState::InProgress);
    assert!((status.completion_fraction - 2.0 / 3.0).abs() < 1e-9);

    let ignored = coordinator
        .handle_notification(&StorageNotification::new(BUCKET, paths.cache_entry("abc")))
        .await
        .unwrap();
    assert_eq!(ignored, MergeOutcome::Ignored);
}

#[tokio::test]
async fn test_clearing_lock_permits_a_new_merge() {
    let recording = Arc::new(RecordingObjectStore::new(Arc::new(InMemoryObjectStore::new())));
    let store: Arc<dyn ObjectStore> = recording.clone();
    let paths = paths();
    seed_metadata(store.as_ref(), &paths, "alerts", 2).await;
    seed_batch(store.as_ref(), &paths, "alerts", 0).await;
    seed_batch(store.as_ref(), &paths, "alerts", 1).await;
    let coordinator = MergeCoordinator::new(store.clone(), paths.clone());

    let MergeOutcome::Merged { run_id: first, .. } = coordinator.try_merge("alerts").await.unwrap() else {
        panic!("first merge should succeed");
    };
    assert_eq!(coordinator.try_merge("alerts").await.unwrap(), MergeOutcome::AlreadyClaimed);
    assert_eq!(coordinator.status("alerts").await.unwrap().state, RunState::Completed);

    coordinator.clear_lock("alerts").await.unwrap();
    let MergeOutcome::Merged { run_id: second, .. } = coordinator.try_merge("alerts").await.unwrap() else {
        panic!("merge after clearing the lock should succeed");
    };

    assert_ne!(first, second);
    assert_eq!(recording.conditional_creates(&paths.merge_lock("alerts")), 2);
    assert_eq!(recording.puts(&paths.merged_result("alerts")), 2);
}

async fn wait_for_completion(analysis: &AnalysisService, name: &str) {
    for _ in 0..200 {
        if analysis.batch_results_status(name).await.unwrap().state == RunState::Completed {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("run of '{name}' did not complete");
}

#[tokio::test]
async fn test_end_to_end_upload_analyze_merge() {
    let (notifying, notifications) = NotifyingObjectStore::new(InMemoryObjectStore::new(), BUCKET);
    let store: Arc<dyn ObjectStore> = Arc::new(notifying);
    let generator = MockTextGenerator::new()
        .when_prompt_contains("alert-0003", MockBehavior::Reply(THREAT_REPLY.to_string()));
    let pipeline = PipelineBuilder::new()
        .with_generator(generator)
        .with_store(store.clone())
        .build();
    let dispatcher = NotificationDispatcher::spawn(pipeline.coordinator.clone(), notifications);

    let analysis = AnalysisService::new(
        store.clone(),
        pipeline.paths.clone(),
        pipeline.coordinator.clone(),
        pipeline.queue.clone(),
        pipeline.settings.clone(),
        pipeline.config.processing.clone(),
    );

    let metadata = analysis.upload_dataset("alerts.jsonl", alerts_jsonl(10)).await.unwrap();
    assert_eq!(metadata.num_rows, 10);
    assert_eq!(metadata.features, vec!["host", "ip", "name", "time"]);
    assert_eq!(
        analysis.batch_results_status("alerts").await.unwrap().state,
        RunState::NotStarted
    );

    let started = analysis.analyze_dataset("alerts").await.unwrap();
    assert_eq!(started.num_batches, 3);
    pipeline.queue.wait_idle().await;
    wait_for_completion(&analysis, "alerts").await;

    let results = analysis.merged_result("alerts").await.unwrap();
    assert_eq!(results.len(), 10);
    assert!(results.windows(2).all(|w| w[0].record_id < w[1].record_id));
    assert_eq!(results[3].class, ThreatClass::RealThreat);
    assert_eq!(pipeline.generator.call_count(), 10);

    // a second run starts from a clean slate and is served from the cache
    let rerun = analysis.analyze_dataset("alerts").await.unwrap();
    assert_eq!(rerun.cleared_artifacts, 6);
    pipeline.queue.wait_idle().await;
    wait_for_completion(&analysis, "alerts").await;
    assert_eq!(pipeline.generator.call_count(), 10);
    assert!(analysis.merged_result("alerts").await.unwrap().iter().all(|r| r.cached));

    let lock = pipeline.coordinator.read_lock("alerts").await.unwrap();
    assert!(matches!(lock, LockState::Merged { record_count: 10, batch_count: 3, .. }));
    dispatcher.abort();
}

#[tokio::test]
async fn test_empty_dataset_merges_without_batches() {
    let pipeline = PipelineBuilder::new().build();
    let analysis = AnalysisService::new(
        pipeline.store.clone(),
        pipeline.paths.clone(),
        pipeline.coordinator.clone(),
        pipeline.queue.clone(),
        pipeline.settings.clone(),
        pipeline.config.processing.clone(),
    );

    analysis.upload_dataset("quiet.jsonl", Vec::new()).await.unwrap();
    let started = analysis.analyze_dataset("quiet").await.unwrap();

    assert_eq!(started.num_batches, 0);
    assert_eq!(
        analysis.batch_results_status("quiet").await.unwrap().state,
        RunState::Completed
    );
    assert!(analysis.merged_result("quiet").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_dataset_is_not_found() {
    let pipeline = PipelineBuilder::new().build();
    let analysis = AnalysisService::new(
        pipeline.store.clone(),
        pipeline.paths.clone(),
        pipeline.coordinator.clone(),
        pipeline.queue.clone(),
        pipeline.settings.clone(),
        pipeline.config.processing.clone(),
    );

    assert!(analysis.analyze_dataset("ghost").await.unwrap_err().is_not_found());
    assert!(analysis.merged_result("ghost").await.unwrap_err().is_not_found());
    assert!(analysis.upload_dataset("ghost.csv", Vec::new()).await.is_err());
    assert!(analysis
        .upload_dataset("broken.jsonl", b"{\"ok\":1}\nnot json\n".to_vec())
        .await
        .is_err());
    assert!(!pipeline
        .store
        .exists(&pipeline.paths.dataset("broken"))
        .await
        .unwrap());
}
