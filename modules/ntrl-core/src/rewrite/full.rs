use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ai_client::{parse_json_response, schema_json, ChatModel};

use crate::rewrite::format_spans;
use crate::traits::{Generator, GeneratorOutput, RawChange, RewriteRequest};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RewriteChangeDto {
    /// Detection UUID from the flagged-span list, when the edit maps to one.
    pub detection_id: Option<String>,
    pub before: String,
    pub after: String,
    pub action: Option<String>,
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RewriteResponse {
    pub neutralized_text: String,
    #[serde(default)]
    pub changes: Vec<RewriteChangeDto>,
}

const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a neutralization editor for news text. Rewrite the article to remove the flagged manipulation while preserving every fact.

HARD CONSTRAINTS (violating any of these makes the rewrite unusable):
- Preserve every name, number, date, and quotation VERBATIM.
- Never upgrade a hedge to a certainty ("allegedly" must never become "definitely").
- Never invent facts, sources, or context that the original does not contain.
- Keep the rewrite between 80% and 110% of the original length.
- Edit only what was flagged; leave unflagged text as close to the original as possible.

Respond with a single JSON object matching this schema, and nothing else:

{schema}"#;

/// Span-guided full-article rewrite via the LLM.
pub struct FullRewriteGenerator {
    model: Arc<dyn ChatModel>,
}

impl FullRewriteGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Generator for FullRewriteGenerator {
    fn name(&self) -> &'static str {
        "full_rewrite"
    }

    async fn generate(&self, req: RewriteRequest<'_>) -> Result<GeneratorOutput> {
        let spans = req
            .scan
            .map(format_spans)
            .unwrap_or_else(|| "(no spans flagged)\n".to_string());

        let system = SYSTEM_PROMPT_TEMPLATE.replace("{schema}", &schema_json::<RewriteResponse>());
        let user = format!(
            "Flagged spans:\n{spans}\nTitle: {title}\n\nArticle:\n{body}",
            title = req.title,
            body = req.body,
        );

        let raw = self.model.complete(&system, &user).await?;
        let response: RewriteResponse = parse_json_response(&raw)?;

        debug!(
            changes = response.changes.len(),
            original_len = req.body.len(),
            rewritten_len = response.neutralized_text.len(),
            "Full rewrite generated"
        );

        Ok(GeneratorOutput {
            text: response.neutralized_text,
            feed_title: None,
            feed_summary: None,
            changes: response
                .changes
                .into_iter()
                .map(|c| RawChange {
                    detection_id: c.detection_id,
                    before: c.before,
                    after: c.after,
                    action: c.action,
                    rationale: c.rationale,
                })
                .collect(),
            model: Some(self.model.model_id().to_string()),
        })
    }
}
