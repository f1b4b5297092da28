//! Session - one conversation and the plan it owns

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tripstore::{IndexValue, Record, now_ms};

use super::id::generate_id;
use super::plan::Plan;
use super::slots::TripSlots;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: i64,
}

/// Where the dialogue stands; derived from the stored fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Empty,
    CollectingSlots,
    PlanReady,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub collected_slots: TripSlots,
    #[serde(default)]
    pub current_plan: Option<Plan>,
    #[serde(default)]
    pub plan_generated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(generate_id("sess"))
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: id.into(),
            turns: Vec::new(),
            collected_slots: TripSlots::default(),
            current_plan: None,
            plan_generated: false,
            language: None,
            currency: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.plan_generated && self.current_plan.is_some() {
            SessionState::PlanReady
        } else if self.turns.is_empty() && self.collected_slots == TripSlots::default() {
            SessionState::Empty
        } else {
            SessionState::CollectingSlots
        }
    }

    pub fn push_turn(&mut self, role: Role, text: impl Into<String>) {
        let now = now_ms();
        self.turns.push(Turn {
            role,
            text: text.into(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    pub fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for Session {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "sessions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("plan_generated".to_string(), IndexValue::Bool(self.plan_generated));
        if let Some(dest) = &self.collected_slots.destination {
            fields.insert("destination".to_string(), IndexValue::String(dest.to_lowercase()));
        }
        fields
    }
}
