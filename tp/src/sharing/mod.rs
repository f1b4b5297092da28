//! Share links, permissions and the suggestion lifecycle

mod coordinator;

use serde::{Deserialize, Serialize};

use crate::domain::{Activity, Permission, Permissions, Plan, Share, Suggestion};

pub use coordinator::SharingCoordinator;

/// Who is asking for a privileged operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The trip owner, by user id
    Owner(String),
    /// Whoever holds this share token
    Token(String),
}

/// Request to share a plan
#[derive(Debug, Clone)]
pub struct NewShare {
    /// Trip id; the originating session id
    pub trip_id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub plan: Plan,
    pub permission: Permission,
    pub is_public: bool,
    pub expires_in_days: Option<u32>,
}

/// Request to propose a replacement for one activity option
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub day: u32,
    pub time_slot_id: String,
    pub activity_index: usize,
    /// Taken from the share snapshot when not given
    pub original_activity: Option<Activity>,
    pub suggested_activity: Activity,
    pub reason: Option<String>,
    pub suggested_by_id: String,
    pub suggested_by_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Accept,
    Reject,
}

impl std::str::FromStr for ReviewAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown review action '{other}'")),
        }
    }
}

/// What a share link shows
#[derive(Debug, Clone, Serialize)]
pub struct SharedView {
    pub token: String,
    pub trip_id: String,
    pub owner_name: String,
    pub permission_level: Permission,
    pub permissions: Permissions,
    pub view_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// The snapshot taken when the link was created
    pub plan: Plan,
    /// Current state of the trip; only for edit links
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_plan: Option<Plan>,
    pub suggestions: Vec<Suggestion>,
}

impl SharedView {
    fn new(share: Share, live_plan: Option<Plan>, suggestions: Vec<Suggestion>) -> Self {
        Self {
            permissions: share.permission_level.permissions(),
            token: share.token,
            trip_id: share.trip_id,
            owner_name: share.owner_name,
            permission_level: share.permission_level,
            view_count: share.view_count,
            expires_at: share.expires_at,
            plan: share.snapshot,
            live_plan,
            suggestions,
        }
    }
}

/// Suggestions for a trip with per-status counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuggestionList {
    pub suggestions: Vec<Suggestion>,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
}

impl SuggestionList {
    fn new(suggestions: Vec<Suggestion>) -> Self {
        use crate::domain::SuggestionStatus::*;
        let count = |status| suggestions.iter().filter(|s| s.status == status).count();
        Self {
            pending: count(Pending),
            accepted: count(Accepted),
            rejected: count(Rejected),
            suggestions,
        }
    }
}
