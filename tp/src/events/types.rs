//! Event types for trip planning activity
//!
//! Events are keyed by session id. Trips reuse their originating session id,
//! so sharing events land in the same stream.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discrete progress stages of a plan build, in emission order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStage {
    Parsing,
    Planning,
    /// Applying a revision to an existing plan
    Revising,
    Flights,
    Hotels,
    Weather,
    Itinerary,
    Formatting,
    Complete,
    /// The build gave up; no further stages follow
    Failed,
}

impl PlanStage {
    /// Stages after which nothing else is emitted for this build
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsing => "parsing",
            Self::Planning => "planning",
            Self::Revising => "revising",
            Self::Flights => "flights",
            Self::Hotels => "hotels",
            Self::Weather => "weather",
            Self::Itinerary => "itinerary",
            Self::Formatting => "formatting",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PlanStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core event enum - everything observable about a session
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TripEvent {
    /// A plan build reached a stage
    StageReached {
        session_id: String,
        stage: PlanStage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// A provider section was left empty
    SectionDegraded {
        session_id: String,
        section: String,
        reason: String,
    },
    /// A conversational turn finished
    TurnCompleted {
        session_id: String,
        needs_more_info: bool,
        complete: bool,
    },
    /// The plan changed through revision or a timeline edit
    PlanChanged { session_id: String, revision: u32 },
    /// A share link was issued
    ShareCreated {
        session_id: String,
        token: String,
        permission: String,
    },
    /// A suggestion was filed or reviewed
    SuggestionChanged {
        session_id: String,
        suggestion_id: String,
        status: String,
    },
}

impl TripEvent {
    pub fn session_id(&self) -> &str {
        match self {
            Self::StageReached { session_id, .. }
            | Self::SectionDegraded { session_id, .. }
            | Self::TurnCompleted { session_id, .. }
            | Self::PlanChanged { session_id, .. }
            | Self::ShareCreated { session_id, .. }
            | Self::SuggestionChanged { session_id, .. } => session_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StageReached { .. } => "StageReached",
            Self::SectionDegraded { .. } => "SectionDegraded",
            Self::TurnCompleted { .. } => "TurnCompleted",
            Self::PlanChanged { .. } => "PlanChanged",
            Self::ShareCreated { .. } => "ShareCreated",
            Self::SuggestionChanged { .. } => "SuggestionChanged",
        }
    }
}

/// One item of a session's progress stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub stage: PlanStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A logged event with timestamp
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// Timestamp of the event
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    /// The event
    pub event: TripEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: TripEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}
