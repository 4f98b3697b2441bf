//! Test fixtures: a fully wired in-memory pipeline and alert datasets.

#![allow(dead_code)]

use super::mock_generator::MockTextGenerator;
use std::sync::Arc;
use std::time::Duration;
use triage_core::cache::ClassificationCache;
use triage_core::classifier::ClassifierClient;
use triage_core::config::TriageConfig;
use triage_core::orchestration::{
    BatchProcessor, LocalTaskQueue, MergeCoordinator, ProcessingSettings, SettingsHandle,
};
use triage_core::storage::{ArtifactPaths, InMemoryObjectStore, ObjectStore};

/// JSONL body of `count` distinct alerts
pub fn alerts_jsonl(count: usize) -> Vec<u8> {
    let mut body = String::new();
    for i in 0..count {
        body.push_str(&format!(
            "{{\"time\": {}, \"name\": \"alert-{i:04}\", \"ip\": \"10.0.{}.{}\", \"host\": \"web\"}}\n",
            1_700_000_000 + i,
            i / 256,
            i % 256
        ));
    }
    body.into_bytes()
}

/// Builder for an in-memory pipeline around a mock generator
pub struct PipelineBuilder {
    config: TriageConfig,
    generator: MockTextGenerator,
    store: Option<Arc<dyn ObjectStore>>,
    timeout: Option<Duration>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        let mut config = TriageConfig::default();
        config.processing.batch_size = 4;
        config.processing.max_concurrent_requests = 3;
        config.processing.chunk_size_bytes = 64;
        config.processing.memory_sample_interval_ms = 5;
        config.queue.retry_base_delay_ms = 1;
        config.queue.retry_max_delay_ms = 5;
        Self {
            config,
            generator: MockTextGenerator::new(),
            store: None,
            timeout: None,
        }
    }

    pub fn with_generator(mut self, generator: MockTextGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_classifier_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn configure(mut self, f: impl FnOnce(&mut TriageConfig)) -> Self {
        f(&mut self.config);
        self
    }

    pub fn build(self) -> Pipeline {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryObjectStore::new()));
        let paths = ArtifactPaths::new(self.config.storage.clone());

        let mut classifier = ClassifierClient::new(Arc::new(self.generator.clone()), &self.config.classifier);
        if let Some(timeout) = self.timeout {
            classifier = classifier.with_timeout(timeout);
        }

        let cache = Arc::new(ClassificationCache::new(
            store.clone(),
            paths.clone(),
            &self.config.cache,
        ));
        let settings = Arc::new(SettingsHandle::new(
            store.clone(),
            paths.settings(),
            ProcessingSettings::from(&self.config.processing),
        ));
        let processor = Arc::new(BatchProcessor::new(
            store.clone(),
            paths.clone(),
            cache.clone(),
            Arc::new(classifier),
            settings.clone(),
            self.config.processing.clone(),
            self.config.cache.clone(),
        ));
        let coordinator = Arc::new(MergeCoordinator::new(store.clone(), paths.clone()));
        let queue = Arc::new(LocalTaskQueue::new(processor.clone(), &self.config.queue));

        Pipeline {
            config: self.config,
            generator: self.generator,
            store,
            paths,
            cache,
            settings,
            processor,
            coordinator,
            queue,
        }
    }
}

pub struct Pipeline {
    pub config: TriageConfig,
    pub generator: MockTextGenerator,
    pub store: Arc<dyn ObjectStore>,
    pub paths: ArtifactPaths,
    pub cache: Arc<ClassificationCache>,
    pub settings: Arc<SettingsHandle>,
    pub processor: Arc<BatchProcessor>,
    pub coordinator: Arc<MergeCoordinator>,
    pub queue: Arc<LocalTaskQueue>,
}
