//! IntentParser - free text to a structured dialogue intent
//!
//! Two implementations: an offline rule parser and an LLM-backed one. Both
//! answer with one [`Intent`]; deadlines are enforced by the caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{IntentConfig, IntentParserKind};
use crate::domain::{SlotPatch, TripSlots};
use crate::llm::{LlmClient, LlmError};
use crate::prompts::PromptLoader;

mod llm;
mod rules;

pub use llm::LlmIntentParser;
pub use rules::RuleIntentParser;

/// What a user message means for the dialogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    /// New or changed trip details
    SlotUpdate { slots: SlotPatch },
    /// A change request against the existing plan
    Revision { instruction: String },
    /// Not enough to go on; ask this
    NeedMore { question: String },
}

impl Intent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SlotUpdate { .. } => "slot_update",
            Self::Revision { .. } => "revision",
            Self::NeedMore { .. } => "need_more",
        }
    }
}

/// Intent parsing failures
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("intent parser rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("intent parser timed out after {0:?}")]
    Timeout(Duration),

    #[error("intent parser failed: {0}")]
    Llm(LlmError),

    #[error("unusable intent: {0}")]
    Malformed(String),
}

impl From<LlmError> for IntentError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited { retry_after } => Self::RateLimited { retry_after },
            LlmError::Timeout(after) => Self::Timeout(after),
            LlmError::Json(e) => Self::Malformed(e.to_string()),
            LlmError::InvalidResponse(msg) => Self::Malformed(msg),
            other => Self::Llm(other),
        }
    }
}

/// Interprets one user message against the collected slots
#[async_trait]
pub trait IntentParser: Send + Sync {
    async fn parse(&self, text: &str, slots: &TripSlots, plan_exists: bool) -> Result<Intent, IntentError>;
}

/// Build the configured parser; the LLM parser needs a client
pub fn create_parser(
    config: &IntentConfig,
    llm: Option<Arc<dyn LlmClient>>,
) -> Result<Arc<dyn IntentParser>, IntentError> {
    debug!(parser = ?config.parser, "create_parser: called");
    match (config.parser, llm) {
        (IntentParserKind::Rules, _) => {
            let parser = RuleIntentParser::new().map_err(|e| IntentError::Malformed(format!("rule pattern: {e}")))?;
            Ok(Arc::new(parser))
        }
        (IntentParserKind::Llm, Some(client)) => {
            Ok(Arc::new(LlmIntentParser::new(client, PromptLoader::from_user_config())))
        }
        (IntentParserKind::Llm, None) => Err(IntentError::Llm(LlmError::Config(
            "intent.parser is llm but no LLM client is configured".to_string(),
        ))),
    }
}
