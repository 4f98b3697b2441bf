//! reqwest-backed [`TextGenerator`].

use super::{ClassificationError, GenerationConfig, TextGenerator};
use crate::config::ClassifierConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

/// POSTs `{prompt, sampling...}` to the configured endpoint and expects `{text}` back
#[derive(Debug, Clone)]
pub struct HttpTextGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpTextGenerator {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassificationError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClassificationError::generation(format!("HTTP client setup failed: {e}")))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, ClassificationError> {
        let body = GenerateRequest {
            prompt,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassificationError::generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClassificationError::generation(format!(
                "generation service returned {status}: {detail}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClassificationError::generation(format!("unreadable response: {e}")))?;

        debug!(chars = parsed.text.len(), "Generation response received");
        Ok(parsed.text)
    }
}
