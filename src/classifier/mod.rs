//! # Classifier
//!
//! One classification = one prompt sent to an external [`TextGenerator`],
//! time-boxed and followed by a repair step that digs the JSON verdict out of
//! whatever prose the model wrapped around it.
//!
//! [`ClassifierClient`] never panics on model output; every failure mode is a
//! [`ClassificationError`] that the batch processor turns into a
//! `class = "error"` result for that record alone.

pub mod client;
pub mod http;
pub mod prompt;

use crate::config::ClassifierConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{repair_response, ClassifierClient};
pub use http::HttpTextGenerator;
pub use prompt::build_prompt;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("Timeout: no response within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("invalid output: {raw}")]
    MalformedOutput { raw: String, reason: String },
}

impl ClassificationError {
    pub fn generation<S: Into<String>>(message: S) -> Self {
        Self::Generation(message.into())
    }

    pub fn malformed<R: Into<String>, S: Into<String>>(raw: R, reason: S) -> Self {
        Self::MalformedOutput {
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClassificationError::Timeout { .. })
    }
}

/// Sampling parameters forwarded with every prompt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl From<&ClassifierConfig> for GenerationConfig {
    fn from(config: &ClassifierConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from(&ClassifierConfig::default())
    }
}

/// External text-generation service
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, ClassificationError>;
}
