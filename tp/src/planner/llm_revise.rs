//! Model-driven revision
//!
//! The model sees the whole plan and answers with a whole plan. The answer
//! is only accepted through `Plan::from_json`, so a malformed or invalid
//! plan never replaces the current one.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::revise::{Revision, RevisionContext, Reviser};
use crate::domain::Plan;
use crate::error::{PlannerError, PlannerResult};
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message, extract_json_object};
use crate::prompts::{PromptLoader, ReviseContext};

/// Full plans are large
const MAX_TOKENS: u32 = 8192;

pub struct LlmReviser {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
}

impl LlmReviser {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader) -> Self {
        Self { llm, prompts }
    }
}

fn llm_failure(err: LlmError) -> PlannerError {
    match err {
        LlmError::RateLimited { retry_after } => PlannerError::RateLimited { retry_after },
        other => PlannerError::Provider(format!("revision model failed: {other}")),
    }
}

/// Count slots added, removed or altered
fn changed_slots(before: &Plan, after: &Plan) -> usize {
    let removed = before.time_slots.iter().filter(|s| after.slot(&s.id).is_none()).count();
    let touched = after
        .time_slots
        .iter()
        .filter(|s| before.slot(&s.id) != Some(*s))
        .count();
    removed + touched
}

#[async_trait]
impl Reviser for LlmReviser {
    async fn revise(&self, plan: &Plan, instruction: &str, _ctx: &RevisionContext<'_>) -> PlannerResult<Revision> {
        debug!(%instruction, "LlmReviser::revise: called");
        let context = ReviseContext {
            instruction: instruction.to_string(),
            plan: serde_json::to_string_pretty(plan).map_err(|e| PlannerError::Validation(e.to_string()))?,
        };
        let prompt = self
            .prompts
            .render("revise", &context)
            .map_err(|e| PlannerError::Validation(e.to_string()))?;

        let request = CompletionRequest {
            system_prompt: prompt,
            messages: vec![Message::user(instruction)],
            max_tokens: MAX_TOKENS,
            json_mode: true,
        };
        let response = self.llm.complete(request).await.map_err(llm_failure)?;
        let content = response
            .content
            .ok_or_else(|| PlannerError::Provider("revision model returned nothing".to_string()))?;
        let value = extract_json_object(&content).map_err(llm_failure)?;

        let mut revised = Plan::from_json(&value.to_string()).inspect_err(|e| {
            warn!(error = %e, "revise: model plan rejected");
        })?;
        if revised.destination != plan.destination || revised.start_date != plan.start_date {
            return Err(PlannerError::Validation(
                "model changed the trip destination or dates; use a slot update instead".to_string(),
            ));
        }
        revised.revision = plan.revision;
        revised.slot_seq = revised.slot_seq.max(plan.slot_seq);
        revised.reconcile_slot_seq();

        let changed = changed_slots(plan, &revised);
        if changed == 0 && revised == *plan {
            return Ok(Revision::unchanged(plan, "No changes were needed."));
        }
        Ok(Revision::changed(revised, format!("Revised the itinerary ({changed} time slot(s) changed).")))
    }
}
