//! Sharing records: live trips, share links, suggestions, notifications

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tripstore::{IndexValue, Record, now_ms};

use super::id::generate_id;
use super::plan::{Activity, Plan};

/// Live, mutable copy of a plan that shares point back to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Same as the originating session id
    pub id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub plan: Plan,
    /// Plan revision the owner's session and this trip last agreed on
    #[serde(default)]
    pub synced_revision: u32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Trip {
    /// Collaborators changed the plan since the last share or pull
    pub fn has_collaborator_changes(&self) -> bool {
        self.plan.revision != self.synced_revision
    }
}

impl Record for Trip {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "trips"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("owner_id".to_string(), IndexValue::String(self.owner_id.clone()));
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    View,
    Suggest,
    Edit,
}

impl Permission {
    pub fn permissions(&self) -> Permissions {
        Permissions {
            can_view: true,
            can_suggest: matches!(self, Self::Suggest | Self::Edit),
            can_edit: matches!(self, Self::Edit),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Suggest => "suggest",
            Self::Edit => "edit",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "view" => Ok(Self::View),
            "suggest" => Ok(Self::Suggest),
            "edit" => Ok(Self::Edit),
            other => Err(format!("unknown permission level '{other}'")),
        }
    }
}

/// Capability flags derived from a permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub can_view: bool,
    pub can_suggest: bool,
    pub can_edit: bool,
}

/// A share link over an immutable plan snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub token: String,
    pub trip_id: String,
    pub owner_id: String,
    pub owner_name: String,
    pub permission_level: Permission,
    pub is_public: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub revoked: bool,
    pub snapshot: Plan,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Share {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn is_active(&self) -> bool {
        !self.revoked && !self.is_expired_at(now_ms())
    }
}

impl Record for Share {
    fn id(&self) -> &str {
        &self.token
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "shares"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("trip_id".to_string(), IndexValue::String(self.trip_id.clone()));
        fields.insert("revoked".to_string(), IndexValue::Bool(self.revoked));
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for SuggestionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown suggestion status '{other}'")),
        }
    }
}

/// A proposed replacement for one activity option
///
/// Both activities are stored by value so the comparison survives later edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub shared_trip_id: String,
    pub share_token: String,
    pub day: u32,
    pub time_slot_id: String,
    pub original_activity_index: usize,
    pub original_activity: Activity,
    pub suggested_activity: Activity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub suggested_by_id: String,
    pub suggested_by_name: String,
    pub status: SuggestionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_note: Option<String>,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<i64>,
    pub updated_at: i64,
}

impl Record for Suggestion {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "suggestions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("trip_id".to_string(), IndexValue::String(self.shared_trip_id.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.as_str().to_string()));
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewSuggestion,
    SuggestionAccepted,
    SuggestionRejected,
    TripShared,
    TripUpdated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub trip_id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Notification {
    pub fn new(user_id: &str, kind: NotificationKind, trip_id: &str, message: impl Into<String>) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("note"),
            user_id: user_id.to_string(),
            kind,
            trip_id: trip_id.to_string(),
            message: message.into(),
            suggestion_id: None,
            read: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn for_suggestion(mut self, suggestion_id: &str) -> Self {
        self.suggestion_id = Some(suggestion_id.to_string());
        self
    }
}

impl Record for Notification {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "notifications"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("user_id".to_string(), IndexValue::String(self.user_id.clone()));
        fields.insert("read".to_string(), IndexValue::Bool(self.read));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_flags() {
        assert_eq!(
            Permission::View.permissions(),
            Permissions {
                can_view: true,
                can_suggest: false,
                can_edit: false
            }
        );
        assert!(Permission::Suggest.permissions().can_suggest);
        assert!(!Permission::Suggest.permissions().can_edit);
        let edit = Permission::Edit.permissions();
        assert!(edit.can_suggest && edit.can_edit);
    }

    #[test]
    fn test_parse_levels() {
        assert_eq!("Edit".parse::<Permission>().unwrap(), Permission::Edit);
        assert!("admin".parse::<Permission>().is_err());
        assert_eq!("pending".parse::<SuggestionStatus>().unwrap(), SuggestionStatus::Pending);
    }

    #[test]
    fn test_share_expiry() {
        let share = Share {
            token: "t".into(),
            trip_id: "trip".into(),
            owner_id: "o".into(),
            owner_name: "Owner".into(),
            permission_level: Permission::View,
            is_public: false,
            expires_at: Some(1_000),
            view_count: 0,
            revoked: false,
            snapshot: crate::domain::plan::fixtures::sample_plan(),
            created_at: 0,
            updated_at: 0,
        };
        assert!(!share.is_expired_at(999));
        assert!(share.is_expired_at(1_000));
        assert!(!share.is_active());
    }
}
