//! Errors surfaced to callers of the planning engine

use std::time::Duration;

use thiserror::Error;

use crate::domain::PlanError;
use crate::state::StateError;
use crate::timeline::TimelineError;

/// Caller-facing error taxonomy
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Bad input or missing trip data; never retried automatically
    #[error("validation failed: {0}")]
    Validation(String),

    /// Every provider section failed
    #[error("provider failure: {0}")]
    Provider(String),

    /// Target no longer exists in the expected form; nothing was applied
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limited, try again in {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("share link expired: {0}")]
    Expired(String),

    #[error("plan schema error: {0}")]
    Schema(#[from] PlanError),

    #[error("storage error: {0}")]
    Store(String),
}

impl PlannerError {
    /// Short machine-readable kind, used by the CLI and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Provider(_) => "provider",
            Self::Conflict(_) => "conflict",
            Self::RateLimited { .. } => "rate_limited",
            Self::Permission(_) => "permission",
            Self::NotFound(_) => "not_found",
            Self::Expired(_) => "expired",
            Self::Schema(_) => "schema",
            Self::Store(_) => "store",
        }
    }
}

impl From<TimelineError> for PlannerError {
    fn from(err: TimelineError) -> Self {
        match err {
            TimelineError::Invalid(plan) => Self::Schema(plan),
            e if e.is_conflict() => Self::Conflict(e.to_string()),
            e => Self::Validation(e.to_string()),
        }
    }
}

impl From<StateError> for PlannerError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::NotFound(what) => Self::NotFound(what),
            e => Self::Store(e.to_string()),
        }
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;
