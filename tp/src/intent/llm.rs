//! LLM-backed intent parser

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, warn};

use super::{Intent, IntentError, IntentParser};
use crate::domain::TripSlots;
use crate::llm::{CompletionRequest, LlmClient, Message, extract_json_object};
use crate::prompts::{IntentContext, PromptLoader};

/// Intent answers are small JSON objects
const MAX_TOKENS: u32 = 1024;

pub struct LlmIntentParser {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
}

impl LlmIntentParser {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader) -> Self {
        Self { llm, prompts }
    }

    fn system_prompt(&self, slots: &TripSlots, plan_exists: bool) -> Result<String, IntentError> {
        let missing: Vec<&str> = slots.missing_required().iter().map(|s| s.as_str()).collect();
        let context = IntentContext {
            today: Local::now().date_naive().to_string(),
            slots: serde_json::to_string_pretty(slots).map_err(|e| IntentError::Malformed(e.to_string()))?,
            plan_exists,
            missing: missing.join(", "),
        };
        self.prompts
            .render("intent", &context)
            .map_err(|e| IntentError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl IntentParser for LlmIntentParser {
    async fn parse(&self, text: &str, slots: &TripSlots, plan_exists: bool) -> Result<Intent, IntentError> {
        debug!(len = text.len(), %plan_exists, "LlmIntentParser::parse: called");
        let request = CompletionRequest {
            system_prompt: self.system_prompt(slots, plan_exists)?,
            messages: vec![Message::user(text)],
            max_tokens: MAX_TOKENS,
            json_mode: true,
        };
        let response = self.llm.complete(request).await?;
        let content = response
            .content
            .ok_or_else(|| IntentError::Malformed("empty model answer".to_string()))?;
        let value = extract_json_object(&content)?;
        let intent: Intent = serde_json::from_value(value).map_err(|e| {
            warn!(error = %e, "parse: model answer does not match the intent schema");
            IntentError::Malformed(e.to_string())
        })?;
        debug!(kind = intent.kind(), "parse: parsed intent");
        Ok(intent)
    }
}
