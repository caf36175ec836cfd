mod client;
pub(crate) mod types;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::model::ChatModel;
use crate::util::parse_json_response;
use client::ClaudeClient;
use types::{ChatRequest, WireMessage};

// =============================================================================
// Claude
// =============================================================================

/// Anthropic Messages API wrapper. Cheap to clone; each call builds its own
/// request so a single instance can serve concurrent detector and generator
/// tasks.
#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: Option<String>,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 4096,
            base_url: None,
        }
    }

    pub fn from_env(model: impl Into<String>) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key, model))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Raise the response budget for long-form rewrites.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> ClaudeClient {
        let client = ClaudeClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client.with_base_url(url)
        } else {
            client
        }
    }

    /// One-shot completion at temperature 0.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String> {
        let request = ChatRequest::new(&self.model)
            .system(system)
            .message(WireMessage::user(user))
            .max_tokens(self.max_tokens)
            .temperature(0.0);

        let response = self.client().chat(&request).await?;

        response
            .text()
            .ok_or_else(|| anyhow!("No text content in Claude response"))
    }

    /// Completion parsed into `T`. The model is asked for bare JSON but
    /// responses wrapped in markdown fences or prose are tolerated.
    pub async fn extract<T: DeserializeOwned + JsonSchema>(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<T> {
        let raw = self.chat_completion(system, user).await?;
        parse_json_response(&raw)
    }
}

#[async_trait]
impl ChatModel for Claude {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        self.chat_completion(system, user).await
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
