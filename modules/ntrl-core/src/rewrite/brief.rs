use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use ai_client::{strip_code_blocks, ChatModel};

use crate::traits::{Generator, GeneratorOutput, RewriteRequest};

const SYSTEM_PROMPT: &str = "You are a news synthesizer. Write a neutral 2-3 sentence brief of the \
article. State only what is verifiably in the text: no loaded language, no urgency framing, no \
speculation about motives. Preserve names, numbers, and dates exactly. Respond with the brief as \
plain text, nothing else.";

/// Neutral 2-3 sentence synthesis of the article.
pub struct BriefGenerator {
    model: Arc<dyn ChatModel>,
}

impl BriefGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Generator for BriefGenerator {
    fn name(&self) -> &'static str {
        "brief_synthesis"
    }

    async fn generate(&self, req: RewriteRequest<'_>) -> Result<GeneratorOutput> {
        let user = format!("Title: {}\n\n{}", req.title, req.body);
        let raw = self.model.complete(SYSTEM_PROMPT, &user).await?;
        let brief = strip_code_blocks(&raw).trim().to_string();
        if brief.is_empty() {
            return Err(anyhow!("empty brief from model"));
        }

        Ok(GeneratorOutput {
            text: brief,
            model: Some(self.model.model_id().to_string()),
            ..Default::default()
        })
    }
}
