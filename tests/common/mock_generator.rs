//! Scriptable text generator standing in for the external model service.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use triage_core::classifier::{ClassificationError, GenerationConfig, TextGenerator};

pub const BENIGN_REPLY: &str =
    r#"{"class": "false_positive", "explanation": "routine maintenance traffic"}"#;
pub const THREAT_REPLY: &str =
    r#"Analysis: {"class": "real_threat", "explanation": "outbound beacon to known C2"}"#;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    Reply(String),
    Fail(String),
    /// Sleep before replying with the default response
    Delay(Duration),
}

#[derive(Debug, Clone)]
struct MockRule {
    /// Applies to prompts containing this substring
    needle: String,
    behavior: MockBehavior,
}

#[derive(Debug, Default)]
struct MockGeneratorState {
    prompts: Vec<String>,
    rules: Vec<MockRule>,
}

/// Mock generator with call tracking and per-record behaviour injection
#[derive(Debug, Clone)]
pub struct MockTextGenerator {
    default_reply: String,
    state: Arc<Mutex<MockGeneratorState>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    latency: Duration,
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            default_reply: BENIGN_REPLY.to_string(),
            state: Arc::new(Mutex::new(MockGeneratorState::default())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            latency: Duration::ZERO,
        }
    }

    /// Every call takes at least `latency`, so overlapping calls are observable
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn when_prompt_contains(self, needle: &str, behavior: MockBehavior) -> Self {
        self.state.lock().rules.push(MockRule {
            needle: needle.to_string(),
            behavior,
        });
        self
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().prompts.len()
    }

    pub fn calls_containing(&self, needle: &str) -> usize {
        self.state
            .lock()
            .prompts
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<String, ClassificationError> {
        let behavior = {
            let mut state = self.state.lock();
            state.prompts.push(prompt.to_string());
            state
                .rules
                .iter()
                .find(|rule| prompt.contains(&rule.needle))
                .map(|rule| rule.behavior.clone())
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(self.in_flight.clone());

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match behavior {
            Some(MockBehavior::Reply(text)) => Ok(text),
            Some(MockBehavior::Fail(message)) => Err(ClassificationError::generation(message)),
            Some(MockBehavior::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(self.default_reply.clone())
            }
            None => Ok(self.default_reply.clone()),
        }
    }
}
