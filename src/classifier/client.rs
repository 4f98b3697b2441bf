use super::{build_prompt, ClassificationError, GenerationConfig, TextGenerator};
use crate::config::ClassifierConfig;
use crate::constants::DEFAULT_EXPLANATION;
use crate::models::{Classification, Record, ThreatClass};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Time-boxed, repairing wrapper around a [`TextGenerator`]
#[derive(Clone)]
pub struct ClassifierClient {
    generator: Arc<dyn TextGenerator>,
    generation: GenerationConfig,
    timeout: Duration,
}

impl std::fmt::Debug for ClassifierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierClient")
            .field("generation", &self.generation)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClassifierClient {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &ClassifierConfig) -> Self {
        Self {
            generator,
            generation: GenerationConfig::from(config),
            timeout: config.request_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn classify(&self, record: &Record) -> Result<Classification, ClassificationError> {
        let prompt = build_prompt(record);
        let text = match tokio::time::timeout(
            self.timeout,
            self.generator.generate(&prompt, &self.generation),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(ClassificationError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                })
            }
        };
        repair_response(&text)
    }
}

/// Extract `{"class": ..., "explanation": ...}` from generated text.
///
/// Keeps the span from the first `{` to the last `}` and parses it; a missing
/// explanation falls back to a fixed placeholder.
pub fn repair_response(text: &str) -> Result<Classification, ClassificationError> {
    let trimmed = text.trim();
    let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    };

    let parsed: Value = serde_json::from_str(candidate)
        .map_err(|e| ClassificationError::malformed(trimmed, e.to_string()))?;

    let label = parsed
        .get("class")
        .and_then(Value::as_str)
        .ok_or_else(|| ClassificationError::malformed(trimmed, "missing \"class\" field"))?;

    let class = match ThreatClass::parse_label(label) {
        Some(ThreatClass::Error) | None => {
            return Err(ClassificationError::malformed(
                trimmed,
                format!("unsupported class label '{label}'"),
            ))
        }
        Some(class) => class,
    };

    let explanation = parsed
        .get("explanation")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string());

    debug!(class = %class, "Repaired model response");
    Ok(Classification { class, explanation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate(&self, _: &str, _: &GenerationConfig) -> Result<String, ClassificationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(r#"{"class":"real_threat"}"#.to_string())
        }
    }

    #[test]
    fn test_repair_extracts_json_from_prose() {
        let text = "Sure! Here is my analysis:\n```json\n{\"class\": \"real_threat\", \"explanation\": \"C2 beacon {periodic}\"}\n```\nHope it helps.";
        let verdict = repair_response(text).unwrap();
        assert_eq!(verdict.class, ThreatClass::RealThreat);
        assert_eq!(verdict.explanation, "C2 beacon {periodic}");
    }

    #[test]
    fn test_repair_defaults_explanation() {
        let verdict = repair_response(r#"{"class":"false_positive"}"#).unwrap();
        assert_eq!(verdict.class, ThreatClass::FalsePositive);
        assert_eq!(verdict.explanation, "no explanation");
    }

    #[test]
    fn test_repair_failures_are_malformed_output() {
        for text in ["no json here", "{\"explanation\": \"x\"}", "{\"class\": \"maybe\"}", "} backwards {"] {
            let err = repair_response(text).unwrap_err();
            assert!(matches!(err, ClassificationError::MalformedOutput { .. }), "{text}");
            assert!(err.to_string().starts_with("invalid output: "));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_classify_times_out() {
        let client = ClassifierClient::new(Arc::new(SlowGenerator), &ClassifierConfig::default())
            .with_timeout(Duration::from_secs(1));
        let record = Record::parse_line(br#"{"name":"x"}"#).unwrap();

        let err = client.classify(&record).await.unwrap_err();
        assert_eq!(err, ClassificationError::Timeout { timeout_secs: 1 });
        assert!(err.to_string().contains("Timeout"));
    }
}
