use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

// =============================================================================
// ChatModel Trait
// =============================================================================

/// The contract an LLM provider must satisfy for this system: given a system
/// prompt and a user message, return raw text. Callers expect that text to
/// contain one JSON object or array when they asked for one, possibly wrapped
/// in markdown code fences; parsing and recovery are the caller's job.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;

    /// Stable identifier for transparency reporting.
    fn model_id(&self) -> &str;
}

// =============================================================================
// StaticModel
// =============================================================================

/// Deterministic stand-in for tests and offline runs. Returns canned
/// responses in order; once exhausted it fails like a dead transport, which
/// is exactly what the degradation paths need to exercise.
pub struct StaticModel {
    responses: Mutex<VecDeque<String>>,
    repeat_last: bool,
}

impl StaticModel {
    /// Responses consumed one per call; calls past the end return an error.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            repeat_last: false,
        }
    }

    /// The same response for every call.
    pub fn always(response: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([response.into()])),
            repeat_last: true,
        }
    }

    /// A model whose every call fails, for transport-failure tests.
    pub fn failing() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ChatModel for StaticModel {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| anyhow!("static model lock poisoned"))?;
        if self.repeat_last {
            return responses
                .front()
                .cloned()
                .ok_or_else(|| anyhow!("static model has no response"));
        }
        responses
            .pop_front()
            .ok_or_else(|| anyhow!("static model exhausted"))
    }

    fn model_id(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_model_returns_in_order_then_fails() {
        let model = StaticModel::new(vec!["one".to_string(), "two".to_string()]);
        assert_eq!(model.complete("s", "u").await.unwrap(), "one");
        assert_eq!(model.complete("s", "u").await.unwrap(), "two");
        assert!(model.complete("s", "u").await.is_err());
    }

    #[tokio::test]
    async fn always_model_repeats() {
        let model = StaticModel::always("same");
        assert_eq!(model.complete("s", "u").await.unwrap(), "same");
        assert_eq!(model.complete("s", "u").await.unwrap(), "same");
    }

    #[tokio::test]
    async fn failing_model_always_errors() {
        let model = StaticModel::failing();
        assert!(model.complete("s", "u").await.is_err());
    }
}
