//! Classification verdicts and per-record results.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatClass {
    FalsePositive,
    RealThreat,
    Error,
}

impl ThreatClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatClass::FalsePositive => "false_positive",
            ThreatClass::RealThreat => "real_threat",
            ThreatClass::Error => "error",
        }
    }

    /// Lenient parse of a generated label (`"False Positive"`, `"real-threat"`, ...)
    pub fn parse_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "false_positive" => Some(ThreatClass::FalsePositive),
            "real_threat" => Some(ThreatClass::RealThreat),
            "error" => Some(ThreatClass::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ThreatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verdict without record context, as produced by the classifier or the cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub class: ThreatClass,
    pub explanation: String,
}

/// One line of a batch-result artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub record_id: u64,
    pub timestamp: String,
    pub class: ThreatClass,
    pub explanation: String,
    #[serde(default)]
    pub cached: bool,
}

impl ClassificationResult {
    pub fn from_classification(
        record_id: u64,
        timestamp: String,
        classification: Classification,
        cached: bool,
    ) -> Self {
        Self {
            record_id,
            timestamp,
            class: classification.class,
            explanation: classification.explanation,
            cached,
        }
    }

    pub fn error<S: Into<String>>(record_id: u64, timestamp: String, reason: S) -> Self {
        Self {
            record_id,
            timestamp,
            class: ThreatClass::Error,
            explanation: reason.into(),
            cached: false,
        }
    }

    pub fn is_error(&self) -> bool {
        self.class == ThreatClass::Error
    }
}

// `cached` is provenance only
impl PartialEq for ClassificationResult {
    fn eq(&self, other: &Self) -> bool {
        self.record_id == other.record_id
            && self.timestamp == other.timestamp
            && self.class == other.class
            && self.explanation == other.explanation
    }
}

impl Eq for ClassificationResult {}
