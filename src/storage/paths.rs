//! Artifact naming.
//!
//! Every dataset-scoped artifact is named `{namespace}/{dataset}_{suffix}.{ext}`;
//! batch artifacts additionally carry the batch id as the last `_`-separated
//! component so a notification's object name alone identifies the dataset and
//! batch it belongs to.

use crate::config::StorageConfig;
use crate::constants::{artifacts, DATASET_EXTENSION};
use crate::error::{TriageError, TriageResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Result,
    Metrics,
}

/// Parsed batch-artifact object name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchArtifact {
    pub dataset_name: String,
    pub batch_id: u64,
    pub kind: ArtifactKind,
}

#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    config: StorageConfig,
}

impl ArtifactPaths {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    /// Dataset name for an uploaded file: `alerts.jsonl` -> `alerts`
    pub fn dataset_name_from_filename(filename: &str) -> TriageResult<String> {
        let suffix = format!(".{DATASET_EXTENSION}");
        let name = filename.strip_suffix(suffix.as_str()).ok_or_else(|| {
            TriageError::validation(format!(
                "unsupported dataset file '{filename}': only .{DATASET_EXTENSION} is accepted"
            ))
        })?;
        Self::validate_dataset_name(name)?;
        Ok(name.to_string())
    }

    pub fn validate_dataset_name(name: &str) -> TriageResult<()> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid {
            return Err(TriageError::validation(format!(
                "invalid dataset name '{name}'"
            )));
        }
        Ok(())
    }

    pub fn dataset(&self, dataset: &str) -> String {
        format!("{}/{dataset}.{DATASET_EXTENSION}", self.config.dataset_dir)
    }

    pub fn metadata(&self, dataset: &str) -> String {
        format!(
            "{}/{dataset}_{}.json",
            self.config.dataset_dir,
            artifacts::METADATA_SUFFIX
        )
    }

    pub fn batch_result(&self, dataset: &str, batch_id: u64) -> String {
        format!("{}{batch_id}.jsonl", self.batch_result_prefix(dataset))
    }

    pub fn batch_metrics(&self, dataset: &str, batch_id: u64) -> String {
        format!("{}{batch_id}.jsonl", self.batch_metrics_prefix(dataset))
    }

    pub fn batch_result_prefix(&self, dataset: &str) -> String {
        format!(
            "{}/{dataset}_{}_",
            self.config.batch_result_dir,
            artifacts::RESULT_SUFFIX
        )
    }

    pub fn batch_metrics_prefix(&self, dataset: &str) -> String {
        format!(
            "{}/{dataset}_{}_",
            self.config.batch_metrics_dir,
            artifacts::METRICS_SUFFIX
        )
    }

    pub fn batch_artifact(&self, dataset: &str, batch_id: u64, kind: ArtifactKind) -> String {
        match kind {
            ArtifactKind::Result => self.batch_result(dataset, batch_id),
            ArtifactKind::Metrics => self.batch_metrics(dataset, batch_id),
        }
    }

    pub fn batch_prefix(&self, dataset: &str, kind: ArtifactKind) -> String {
        match kind {
            ArtifactKind::Result => self.batch_result_prefix(dataset),
            ArtifactKind::Metrics => self.batch_metrics_prefix(dataset),
        }
    }

    pub fn merged_result(&self, dataset: &str) -> String {
        format!(
            "{}/{dataset}_{}.jsonl",
            self.config.result_dir,
            artifacts::RESULT_SUFFIX
        )
    }

    pub fn merged_metrics(&self, dataset: &str) -> String {
        format!(
            "{}/{dataset}_{}.jsonl",
            self.config.metrics_dir,
            artifacts::METRICS_SUFFIX
        )
    }

    pub fn merge_lock(&self, dataset: &str) -> String {
        format!(
            "{}/{dataset}_{}",
            self.config.flag_dir,
            artifacts::MERGE_LOCK_SUFFIX
        )
    }

    pub fn cache_prefix(&self) -> String {
        format!("{}/", self.config.cache_dir)
    }

    pub fn cache_entry(&self, record_hash: &str) -> String {
        format!("{}/{record_hash}.json", self.config.cache_dir)
    }

    pub fn settings(&self) -> &str {
        &self.config.settings_object
    }

    /// Parse a batch-result or batch-metrics object name; anything else is `None`
    pub fn parse_batch_artifact(&self, object_name: &str) -> Option<BatchArtifact> {
        let (dir, file) = object_name.split_once('/')?;
        let (kind, marker) = if dir == self.config.batch_result_dir {
            (ArtifactKind::Result, artifacts::RESULT_SUFFIX)
        } else if dir == self.config.batch_metrics_dir {
            (ArtifactKind::Metrics, artifacts::METRICS_SUFFIX)
        } else {
            return None;
        };

        let stem = file.strip_suffix(".jsonl")?;
        let (dataset, batch_id) = stem.rsplit_once(&format!("_{marker}_"))?;
        if batch_id.is_empty() || !batch_id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Self::validate_dataset_name(dataset).ok()?;

        Some(BatchArtifact {
            dataset_name: dataset.to_string(),
            batch_id: batch_id.parse().ok()?,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths() -> ArtifactPaths {
        ArtifactPaths::new(StorageConfig::default())
    }

    #[test]
    fn test_layout() {
        let p = paths();
        assert_eq!(p.dataset("alerts"), "datasets/alerts.jsonl");
        assert_eq!(p.metadata("alerts"), "datasets/alerts_metadata.json");
        assert_eq!(p.batch_result("alerts", 7), "batch_results/alerts_result_7.jsonl");
        assert_eq!(p.batch_metrics("alerts", 7), "batch_metrics/alerts_metrics_7.jsonl");
        assert_eq!(p.merged_result("alerts"), "results/alerts_result.jsonl");
        assert_eq!(p.merged_metrics("alerts"), "metrics/alerts_metrics.jsonl");
        assert_eq!(p.merge_lock("alerts"), "control_flags/alerts_merge.lock");
        assert_eq!(p.cache_entry("ab12"), "cache/ab12.json");
    }

    #[test]
    fn test_parse_batch_artifacts() {
        let p = paths();
        assert_eq!(
            p.parse_batch_artifact("batch_results/alerts_result_12.jsonl"),
            Some(BatchArtifact {
                dataset_name: "alerts".to_string(),
                batch_id: 12,
                kind: ArtifactKind::Result,
            })
        );
        // dataset names may themselves contain the marker
        let nested = p
            .parse_batch_artifact("batch_metrics/a_metrics_b_metrics_3.jsonl")
            .unwrap();
        assert_eq!(nested.dataset_name, "a_metrics_b");
        assert_eq!(nested.batch_id, 3);
        assert_eq!(nested.kind, ArtifactKind::Metrics);
    }

    #[test]
    fn test_parse_rejects_foreign_objects() {
        let p = paths();
        assert!(p.parse_batch_artifact("results/alerts_result.jsonl").is_none());
        assert!(p.parse_batch_artifact("batch_results/alerts_metrics_1.jsonl").is_none());
        assert!(p.parse_batch_artifact("batch_results/alerts_result_x.jsonl").is_none());
        assert!(p.parse_batch_artifact("batch_results/_result_1.jsonl").is_none());
        assert!(p.parse_batch_artifact("batch_results/alerts_result_1.json").is_none());
        assert!(p.parse_batch_artifact("cache/abc.json").is_none());
    }

    #[test]
    fn test_dataset_names() {
        assert_eq!(
            ArtifactPaths::dataset_name_from_filename("alerts-2024.jsonl").unwrap(),
            "alerts-2024"
        );
        assert!(ArtifactPaths::dataset_name_from_filename("alerts.csv").is_err());
        assert!(ArtifactPaths::dataset_name_from_filename(".jsonl").is_err());
        assert!(ArtifactPaths::dataset_name_from_filename("a/b.jsonl").is_err());
    }
}
