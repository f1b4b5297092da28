//! LLM client module
//!
//! Provides LLM completion requests and helpers for JSON answers.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
mod openai;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAIClient;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAIClient::from_config(config)?)),
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::Config(format!(
                "Unknown LLM provider: '{}'. Supported: openai",
                other
            )))
        }
    }
}

/// Pull the outermost JSON object out of a model answer
///
/// Models sometimes wrap JSON in prose or code fences; everything outside the
/// first `{` and the last `}` is dropped.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value, LlmError> {
    let start = text
        .find('{')
        .ok_or_else(|| LlmError::InvalidResponse("no JSON object in response".to_string()))?;
    let end = text
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| LlmError::InvalidResponse("unterminated JSON object in response".to_string()))?;
    Ok(serde_json::from_str(&text[start..=end])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object() {
        let value = extract_json_object("Sure!\n```json\n{\"kind\": \"revision\"}\n```").unwrap();
        assert_eq!(value["kind"], "revision");

        assert!(extract_json_object("no json here").is_err());
        assert!(extract_json_object("} backwards {").is_err());
        assert!(matches!(extract_json_object("{not json}"), Err(LlmError::Json(_))));
    }

    #[test]
    fn test_unknown_provider() {
        let config = LlmConfig {
            provider: "acme".to_string(),
            ..Default::default()
        };
        assert!(matches!(create_client(&config), Err(LlmError::Config(_))));
    }
}
