use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use ai_client::{parse_json_response, schema_json, ChatModel};

use crate::traits::{Generator, GeneratorOutput, RewriteRequest};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FeedResponse {
    pub feed_title: String,
    pub feed_summary: String,
}

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You write feed entries for neutralized news. Produce a factual title (no urgency markers, no rage verbs, no caps-lock) and a one-sentence summary. Preserve names, numbers, and dates exactly.

Respond with a single JSON object matching this schema, and nothing else:

{schema}"#;

/// Feed title and one-line summary for list surfaces.
pub struct FeedGenerator {
    model: Arc<dyn ChatModel>,
}

impl FeedGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Generator for FeedGenerator {
    fn name(&self) -> &'static str {
        "feed_output"
    }

    async fn generate(&self, req: RewriteRequest<'_>) -> Result<GeneratorOutput> {
        let system = SYSTEM_PROMPT_TEMPLATE.replace("{schema}", &schema_json::<FeedResponse>());
        let user = format!("Title: {}\n\n{}", req.title, req.body);

        let raw = self.model.complete(&system, &user).await?;
        let response: FeedResponse = parse_json_response(&raw)?;

        Ok(GeneratorOutput {
            feed_title: Some(response.feed_title),
            feed_summary: Some(response.feed_summary),
            model: Some(self.model.model_id().to_string()),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ai_client::StaticModel;

    #[tokio::test]
    async fn parses_feed_response_with_fences() {
        let response = format!(
            "```json\n{}\n```",
            serde_json::json!({
                "feed_title": "Senator criticizes opponents at hearing",
                "feed_summary": "The exchange came during Tuesday's budget hearing."
            })
        );
        let generator = FeedGenerator::new(Arc::new(StaticModel::always(response)));
        let out = generator
            .generate(RewriteRequest {
                body: "body",
                title: "BREAKING: Senator SLAMS opponents",
                deck: None,
                scan: None,
            })
            .await
            .unwrap();
        assert_eq!(
            out.feed_title.as_deref(),
            Some("Senator criticizes opponents at hearing")
        );
        assert!(out.feed_summary.is_some());
        assert!(out.text.is_empty());
    }

    #[tokio::test]
    async fn missing_fields_are_an_error() {
        let generator = FeedGenerator::new(Arc::new(StaticModel::always(r#"{"feed_title": "x"}"#)));
        assert!(generator
            .generate(RewriteRequest {
                body: "body",
                title: "title",
                deck: None,
                scan: None,
            })
            .await
            .is_err());
    }
}
