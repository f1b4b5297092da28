//! PlanAssembler - builds and revises complete itineraries
//!
//! Generation fans out to the provider gateway under per-call deadlines and
//! degrades failed sections instead of failing the plan. Revision goes
//! through a pluggable [`Reviser`] strategy. Both always hand back a plan
//! that passes [`crate::domain::Plan::validate`].

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::provider::ProviderError;

mod assembler;
mod llm_revise;
pub mod pacing;
pub mod pricing;
mod revise;

pub use assembler::PlanAssembler;
pub use llm_revise::LlmReviser;
pub use revise::{HeuristicReviser, Revision, RevisionContext, Reviser, create_reviser};

/// Run one provider call under its own deadline
pub(crate) async fn with_deadline<T, F>(call: &'static str, after: Duration, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    debug!(call, ?after, "with_deadline: called");
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout { call, after }),
    }
}
