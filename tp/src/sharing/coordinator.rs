//! SharingCoordinator - share links over plan snapshots and reviewed suggestions
//!
//! A share freezes the plan it was created from. The trip record keeps the
//! live copy; accepted suggestions and edit-link changes land there, one
//! writer per trip at a time.

use std::sync::Arc;

use tracing::{debug, info, warn};
use tripstore::now_ms;

use super::{Access, NewShare, NewSuggestion, ReviewAction, SharedView, SuggestionList};
use crate::config::SharingConfig;
use crate::domain::{
    Notification, NotificationKind, Plan, Share, Suggestion, SuggestionStatus, Trip, generate_id, generate_token,
};
use crate::error::{PlannerError, PlannerResult};
use crate::events::EventBus;
use crate::planner::pricing;
use crate::session::KeyedLocks;
use crate::state::StateManager;
use crate::timeline::{self, TimelineEdit, TimelineError};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub struct SharingCoordinator {
    state: StateManager,
    bus: Arc<EventBus>,
    config: SharingConfig,
    daily_transport: f64,
    trip_locks: KeyedLocks,
    share_locks: KeyedLocks,
}

/// Suggestion acceptance only fails as a conflict, unless the result is invalid
fn accept_error(err: TimelineError) -> PlannerError {
    match err {
        TimelineError::Invalid(e) => PlannerError::Schema(e),
        e => PlannerError::Conflict(e.to_string()),
    }
}

/// Merge the owner's plan into an already shared trip
///
/// Whichever side moved since the last sync wins. When both moved the
/// owner has to pull the trip's plan into the session first.
fn reshare(mut trip: Trip, request: &NewShare, now: i64) -> PlannerResult<Trip> {
    let owner_moved = request.plan.revision != trip.synced_revision;
    match (trip.has_collaborator_changes(), owner_moved) {
        (true, true) => {
            return Err(PlannerError::Conflict(format!(
                "trip {} has collaborator changes since it was last shared; pull them into the session first",
                trip.id
            )));
        }
        (true, false) => {
            debug!(trip_id = %trip.id, revision = trip.plan.revision, "reshare: keeping collaborator changes");
        }
        (false, _) => {
            trip.plan = request.plan.clone();
            trip.synced_revision = request.plan.revision;
        }
    }
    trip.owner_name = request.owner_name.clone();
    trip.updated_at = now;
    Ok(trip)
}

impl SharingCoordinator {
    pub fn new(state: StateManager, bus: Arc<EventBus>, config: SharingConfig, daily_transport: f64) -> Self {
        Self {
            state,
            bus,
            config,
            daily_transport,
            trip_locks: KeyedLocks::new(),
            share_locks: KeyedLocks::new(),
        }
    }

    pub fn share_url(&self, token: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), token)
    }

    async fn notify(&self, notification: Notification) {
        let (user, kind) = (notification.user_id.clone(), notification.kind);
        if let Err(e) = self.state.create_notification(notification).await {
            warn!(%user, ?kind, error = %e, "notify: failed to store notification");
        }
    }

    /// Load a share that can still be used
    async fn active_share(&self, token: &str) -> PlannerResult<Share> {
        let share = self
            .state
            .get_share(token)
            .await?
            .filter(|s| !s.revoked)
            .ok_or_else(|| PlannerError::NotFound("share link".to_string()))?;
        if share.is_expired_at(now_ms()) {
            return Err(PlannerError::Expired(format!("link for trip {}", share.trip_id)));
        }
        Ok(share)
    }

    /// Check that `access` may edit trip `trip_id`
    async fn authorize_edit(&self, access: &Access, trip_id: &str) -> PlannerResult<()> {
        match access {
            Access::Owner(user_id) => {
                let trip = self.state.get_trip_required(trip_id).await?;
                if trip.owner_id != *user_id {
                    return Err(PlannerError::Permission(format!("{user_id} does not own trip {trip_id}")));
                }
            }
            Access::Token(token) => {
                let share = self.active_share(token).await?;
                if share.trip_id != trip_id || !share.permission_level.permissions().can_edit {
                    return Err(PlannerError::Permission("this link cannot edit the trip".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Create a share link, storing a frozen snapshot of the plan
    pub async fn create_share(&self, request: NewShare) -> PlannerResult<Share> {
        debug!(trip_id = %request.trip_id, permission = ?request.permission, "create_share: called");
        request.plan.validate()?;
        let now = now_ms();

        let live = {
            let _guard = self.trip_locks.lock(&request.trip_id).await;
            let trip = match self.state.get_trip(&request.trip_id).await? {
                Some(existing) if existing.owner_id != request.owner_id => {
                    return Err(PlannerError::Permission(format!(
                        "trip {} belongs to another user",
                        request.trip_id
                    )));
                }
                Some(existing) => reshare(existing, &request, now)?,
                None => Trip {
                    id: request.trip_id.clone(),
                    owner_id: request.owner_id.clone(),
                    owner_name: request.owner_name.clone(),
                    plan: request.plan.clone(),
                    synced_revision: request.plan.revision,
                    created_at: now,
                    updated_at: now,
                },
            };
            let live = trip.plan.clone();
            self.state.put_trip(trip).await?;
            live
        };

        let share = Share {
            token: generate_token(self.config.token_length),
            trip_id: request.trip_id.clone(),
            owner_id: request.owner_id.clone(),
            owner_name: request.owner_name,
            permission_level: request.permission,
            is_public: request.is_public,
            expires_at: request.expires_in_days.map(|days| now + i64::from(days) * DAY_MS),
            view_count: 0,
            revoked: false,
            snapshot: live,
            created_at: now,
            updated_at: now,
        };
        self.state.create_share(share.clone()).await?;
        info!(trip_id = %share.trip_id, permission = share.permission_level.as_str(), "create_share: link created");

        self.notify(Notification::new(
            &request.owner_id,
            NotificationKind::TripShared,
            &request.trip_id,
            format!(
                "Your trip to {} was shared with {} access",
                share.snapshot.destination,
                share.permission_level.as_str()
            ),
        ))
        .await;
        self.bus
            .emitter_for(&share.trip_id)
            .share_created(&share.token, share.permission_level.as_str());
        Ok(share)
    }

    /// Open a share link, counting the view
    pub async fn read_share(&self, token: &str) -> PlannerResult<SharedView> {
        debug!("read_share: called");
        let share = {
            let _guard = self.share_locks.lock(token).await;
            let mut share = self.active_share(token).await?;
            share.view_count += 1;
            share.updated_at = now_ms();
            self.state.put_share(share.clone()).await?;
            share
        };

        let live_plan = if share.permission_level.permissions().can_edit {
            self.state.get_trip(&share.trip_id).await?.map(|t| t.plan)
        } else {
            None
        };
        let suggestions = self.state.list_suggestions(&share.trip_id, None).await?;
        Ok(SharedView::new(share, live_plan, suggestions))
    }

    pub async fn list_shares(&self, trip_id: &str) -> PlannerResult<Vec<Share>> {
        Ok(self.state.list_shares(trip_id).await?)
    }

    /// Disable a link; only its owner may do so
    pub async fn revoke_share(&self, owner_id: &str, token: &str) -> PlannerResult<Share> {
        debug!(%owner_id, "revoke_share: called");
        let _guard = self.share_locks.lock(token).await;
        let mut share = self
            .state
            .get_share(token)
            .await?
            .ok_or_else(|| PlannerError::NotFound("share link".to_string()))?;
        if share.owner_id != owner_id {
            return Err(PlannerError::Permission("only the owner can revoke a link".to_string()));
        }
        if !share.revoked {
            share.revoked = true;
            share.updated_at = now_ms();
            self.state.put_share(share.clone()).await?;
            info!(trip_id = %share.trip_id, "revoke_share: link revoked");
        }
        Ok(share)
    }

    /// Propose a replacement activity through a suggest or edit link
    pub async fn create_suggestion(&self, token: &str, request: NewSuggestion) -> PlannerResult<Suggestion> {
        debug!(slot = %request.time_slot_id, index = request.activity_index, "create_suggestion: called");
        let share = self.active_share(token).await?;
        if !share.permission_level.permissions().can_suggest {
            return Err(PlannerError::Permission(format!(
                "a {} link cannot suggest changes",
                share.permission_level.as_str()
            )));
        }

        let original = match request.original_activity {
            Some(activity) => activity,
            None => share
                .snapshot
                .slot(&request.time_slot_id)
                .and_then(|slot| slot.options.get(request.activity_index))
                .cloned()
                .ok_or_else(|| {
                    PlannerError::Validation(format!(
                        "slot {} has no option {}",
                        request.time_slot_id, request.activity_index
                    ))
                })?,
        };
        if original.id == request.suggested_activity.id {
            return Err(PlannerError::Validation(
                "the suggested activity is the same as the original".to_string(),
            ));
        }

        let now = now_ms();
        let suggestion = Suggestion {
            id: generate_id("sugg"),
            shared_trip_id: share.trip_id.clone(),
            share_token: share.token.clone(),
            day: request.day,
            time_slot_id: request.time_slot_id,
            original_activity_index: request.activity_index,
            original_activity: original,
            suggested_activity: request.suggested_activity,
            reason: request.reason.filter(|r| !r.trim().is_empty()),
            suggested_by_id: request.suggested_by_id,
            suggested_by_name: request.suggested_by_name,
            status: SuggestionStatus::Pending,
            review_note: None,
            created_at: now,
            reviewed_at: None,
            updated_at: now,
        };
        self.state.create_suggestion(suggestion.clone()).await?;
        info!(suggestion_id = %suggestion.id, trip_id = %suggestion.shared_trip_id, "create_suggestion: stored");

        self.notify(
            Notification::new(
                &share.owner_id,
                NotificationKind::NewSuggestion,
                &share.trip_id,
                format!(
                    "{} suggested \"{}\" instead of \"{}\" on day {}",
                    suggestion.suggested_by_name,
                    suggestion.suggested_activity.title,
                    suggestion.original_activity.title,
                    suggestion.day
                ),
            )
            .for_suggestion(&suggestion.id),
        )
        .await;
        self.bus
            .emitter_for(&suggestion.shared_trip_id)
            .suggestion_changed(&suggestion.id, suggestion.status.as_str());
        Ok(suggestion)
    }

    /// Accept or reject a pending suggestion
    ///
    /// Accepting replaces the option in the live trip only if it is still the
    /// activity the suggestion was made against. Otherwise the call fails with
    /// a conflict and the suggestion stays pending.
    pub async fn review_suggestion(
        &self,
        access: &Access,
        suggestion_id: &str,
        action: ReviewAction,
        note: Option<String>,
    ) -> PlannerResult<Suggestion> {
        debug!(%suggestion_id, ?action, "review_suggestion: called");
        let trip_id = self.get_suggestion(suggestion_id).await?.shared_trip_id;
        self.authorize_edit(access, &trip_id).await?;

        let _guard = self.trip_locks.lock(&trip_id).await;
        let mut suggestion = self.get_suggestion(suggestion_id).await?;
        if suggestion.status != SuggestionStatus::Pending {
            return Err(PlannerError::Conflict(format!(
                "suggestion {} was already {}",
                suggestion.id,
                suggestion.status.as_str()
            )));
        }

        let status = match action {
            ReviewAction::Reject => SuggestionStatus::Rejected,
            ReviewAction::Accept => {
                let mut trip = self.state.get_trip_required(&trip_id).await?;
                let mut plan = timeline::replace_activity(
                    &trip.plan,
                    &suggestion.time_slot_id,
                    suggestion.original_activity_index,
                    suggestion.suggested_activity.clone(),
                    Some(&suggestion.original_activity.id),
                )
                .map_err(accept_error)?;
                pricing::recompute(&mut plan, self.daily_transport);
                trip.plan = plan;
                trip.updated_at = now_ms();
                self.state.put_trip(trip).await?;
                SuggestionStatus::Accepted
            }
        };

        let now = now_ms();
        suggestion.status = status;
        suggestion.review_note = note.filter(|n| !n.trim().is_empty());
        suggestion.reviewed_at = Some(now);
        suggestion.updated_at = now;
        self.state.put_suggestion(suggestion.clone()).await?;
        info!(%suggestion_id, status = status.as_str(), "review_suggestion: reviewed");

        let (kind, verb) = match status {
            SuggestionStatus::Accepted => (NotificationKind::SuggestionAccepted, "accepted"),
            _ => (NotificationKind::SuggestionRejected, "declined"),
        };
        self.notify(
            Notification::new(
                &suggestion.suggested_by_id,
                kind,
                &trip_id,
                format!("Your suggestion \"{}\" was {verb}", suggestion.suggested_activity.title),
            )
            .for_suggestion(&suggestion.id),
        )
        .await;
        self.bus
            .emitter_for(&trip_id)
            .suggestion_changed(&suggestion.id, status.as_str());
        Ok(suggestion)
    }

    pub async fn get_suggestion(&self, id: &str) -> PlannerResult<Suggestion> {
        self.state
            .get_suggestion(id)
            .await?
            .ok_or_else(|| PlannerError::NotFound(format!("suggestion {id}")))
    }

    pub async fn list_suggestions(&self, trip_id: &str, status: Option<SuggestionStatus>) -> PlannerResult<SuggestionList> {
        let suggestions = self
            .state
            .list_suggestions(trip_id, status.map(|s| s.as_str().to_string()))
            .await?;
        Ok(SuggestionList::new(suggestions))
    }

    /// Apply a timeline edit to the live trip through an edit link
    pub async fn edit_shared(&self, token: &str, edit: &TimelineEdit) -> PlannerResult<Plan> {
        debug!(op = edit.name(), "edit_shared: called");
        let share = self.active_share(token).await?;
        if !share.permission_level.permissions().can_edit {
            return Err(PlannerError::Permission(format!(
                "a {} link cannot edit the trip",
                share.permission_level.as_str()
            )));
        }

        let _guard = self.trip_locks.lock(&share.trip_id).await;
        let mut trip = self.state.get_trip_required(&share.trip_id).await?;
        let mut plan = timeline::apply(&trip.plan, edit)?;
        if edit.changes_selection() {
            pricing::recompute(&mut plan, self.daily_transport);
        }
        trip.plan = plan.clone();
        trip.updated_at = now_ms();
        self.state.put_trip(trip).await?;

        self.notify(Notification::new(
            &share.owner_id,
            NotificationKind::TripUpdated,
            &share.trip_id,
            format!("Your trip to {} was edited through a shared link ({})", plan.destination, edit.name()),
        ))
        .await;
        self.bus.emitter_for(&share.trip_id).plan_changed(plan.revision);
        Ok(plan)
    }

    /// The live trip; owner only
    pub async fn trip(&self, owner_id: &str, trip_id: &str) -> PlannerResult<Trip> {
        self.authorize_edit(&Access::Owner(owner_id.to_string()), trip_id).await?;
        Ok(self.state.get_trip_required(trip_id).await?)
    }

    /// Record that the owner's session took over the trip's plan
    ///
    /// `base_revision` is the trip revision the session pulled; a trip that
    /// moved on since then is a conflict and stays as it is.
    pub async fn adopt_plan(&self, owner_id: &str, trip_id: &str, plan: Plan, base_revision: u32) -> PlannerResult<Trip> {
        debug!(%trip_id, base_revision, revision = plan.revision, "adopt_plan: called");
        plan.validate()?;
        let _guard = self.trip_locks.lock(trip_id).await;
        self.authorize_edit(&Access::Owner(owner_id.to_string()), trip_id).await?;
        let mut trip = self.state.get_trip_required(trip_id).await?;
        if trip.plan.revision != base_revision {
            return Err(PlannerError::Conflict(format!(
                "trip {trip_id} changed again (revision {}); pull once more",
                trip.plan.revision
            )));
        }
        trip.synced_revision = plan.revision;
        trip.plan = plan;
        trip.updated_at = now_ms();
        self.state.put_trip(trip.clone()).await?;
        self.bus.emitter_for(trip_id).plan_changed(trip.plan.revision);
        Ok(trip)
    }

    pub async fn notifications(&self, user_id: &str, unread_only: bool) -> PlannerResult<Vec<Notification>> {
        Ok(self.state.list_notifications(user_id, unread_only).await?)
    }

    pub async fn mark_notification_read(&self, user_id: &str, id: &str) -> PlannerResult<Notification> {
        let mut notification = self
            .state
            .get_notification(id)
            .await?
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| PlannerError::NotFound(format!("notification {id}")))?;
        if !notification.read {
            notification.read = true;
            notification.updated_at = now_ms();
            self.state.put_notification(notification.clone()).await?;
        }
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plan::fixtures::{activity, sample_plan};
    use crate::domain::{Category, Permission};

    fn coordinator() -> SharingCoordinator {
        let state = StateManager::spawn_in_memory().unwrap();
        SharingCoordinator::new(state, Arc::new(EventBus::new(16)), SharingConfig::default(), 15.0)
    }

    fn request(permission: Permission) -> NewShare {
        NewShare {
            trip_id: "sess-1".into(),
            owner_id: "owner".into(),
            owner_name: "Olivia".into(),
            plan: sample_plan(),
            permission,
            is_public: false,
            expires_in_days: None,
        }
    }

    fn suggest(slot: &str, index: usize, id: &str) -> NewSuggestion {
        NewSuggestion {
            day: 1,
            time_slot_id: slot.into(),
            activity_index: index,
            original_activity: None,
            suggested_activity: activity(id, Category::Dinner),
            reason: Some("better reviews".into()),
            suggested_by_id: "friend".into(),
            suggested_by_name: "Sam".into(),
        }
    }

    #[tokio::test]
    async fn test_share_snapshot_and_view_count() {
        let sharing = coordinator();
        let share = sharing.create_share(request(Permission::View)).await.unwrap();
        assert_eq!(share.token.len(), 22);
        assert!(sharing.share_url(&share.token).ends_with(&share.token));

        let first = sharing.read_share(&share.token).await.unwrap();
        let second = sharing.read_share(&share.token).await.unwrap();
        assert_eq!(first.view_count, 1);
        assert_eq!(second.view_count, 2);
        assert!(!second.permissions.can_suggest);
        assert!(second.live_plan.is_none());
        assert_eq!(second.plan, sample_plan());

        let notes = sharing.notifications("owner", true).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::TripShared);
    }

    #[tokio::test]
    async fn test_view_link_cannot_suggest() {
        let sharing = coordinator();
        let share = sharing.create_share(request(Permission::View)).await.unwrap();
        let err = sharing
            .create_suggestion(&share.token, suggest("d1-0900-0", 0, "new"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Permission(_)));
    }

    #[tokio::test]
    async fn test_expired_and_revoked_links() {
        let sharing = coordinator();
        let mut req = request(Permission::View);
        req.expires_in_days = Some(0);
        let expired = sharing.create_share(req).await.unwrap();
        assert!(matches!(
            sharing.read_share(&expired.token).await.unwrap_err(),
            PlannerError::Expired(_)
        ));

        let share = sharing.create_share(request(Permission::View)).await.unwrap();
        let err = sharing.revoke_share("someone", &share.token).await.unwrap_err();
        assert!(matches!(err, PlannerError::Permission(_)));
        sharing.revoke_share("owner", &share.token).await.unwrap();
        assert!(matches!(
            sharing.read_share(&share.token).await.unwrap_err(),
            PlannerError::NotFound(_)
        ));
        assert_eq!(sharing.list_shares("sess-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_accept_applies_to_live_trip_only() {
        let sharing = coordinator();
        let share = sharing.create_share(request(Permission::Suggest)).await.unwrap();
        let suggestion = sharing
            .create_suggestion(&share.token, suggest("d1-0900-0", 1, "cafe"))
            .await
            .unwrap();
        assert_eq!(suggestion.original_activity.id, "d1-0900-0-a1");

        // A suggest link cannot review
        let err = sharing
            .review_suggestion(&Access::Token(share.token.clone()), &suggestion.id, ReviewAction::Accept, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Permission(_)));

        let owner = Access::Owner("owner".into());
        let accepted = sharing
            .review_suggestion(&owner, &suggestion.id, ReviewAction::Accept, Some("nice".into()))
            .await
            .unwrap();
        assert_eq!(accepted.status, SuggestionStatus::Accepted);
        assert!(accepted.reviewed_at.is_some());

        let trip = sharing.trip("owner", "sess-1").await.unwrap();
        assert_eq!(trip.plan.slot("d1-0900-0").unwrap().options[1].id, "cafe");
        let view = sharing.read_share(&share.token).await.unwrap();
        assert_eq!(view.plan.slot("d1-0900-0").unwrap().options[1].id, "d1-0900-0-a1");

        // Terminal
        let err = sharing
            .review_suggestion(&owner, &suggestion.id, ReviewAction::Reject, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Conflict(_)));

        let friend = sharing.notifications("friend", false).await.unwrap();
        assert_eq!(friend[0].kind, NotificationKind::SuggestionAccepted);
    }

    #[tokio::test]
    async fn test_second_accept_on_same_option_conflicts() {
        let sharing = coordinator();
        let share = sharing.create_share(request(Permission::Edit)).await.unwrap();
        let first = sharing
            .create_suggestion(&share.token, suggest("d2-0900-2", 0, "one"))
            .await
            .unwrap();
        let second = sharing
            .create_suggestion(&share.token, suggest("d2-0900-2", 0, "two"))
            .await
            .unwrap();

        let editor = Access::Token(share.token.clone());
        sharing
            .review_suggestion(&editor, &first.id, ReviewAction::Accept, None)
            .await
            .unwrap();
        let err = sharing
            .review_suggestion(&editor, &second.id, ReviewAction::Accept, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Conflict(_)));

        let list = sharing.list_suggestions("sess-1", None).await.unwrap();
        assert_eq!((list.pending, list.accepted, list.rejected), (1, 1, 0));
        let trip = sharing.trip("owner", "sess-1").await.unwrap();
        assert_eq!(trip.plan.slot("d2-0900-2").unwrap().options[0].id, "one");
    }

    #[tokio::test]
    async fn test_accept_after_slot_removed_stays_pending() {
        let sharing = coordinator();
        let share = sharing.create_share(request(Permission::Edit)).await.unwrap();
        let suggestion = sharing
            .create_suggestion(&share.token, suggest("d1-0900-0", 2, "late"))
            .await
            .unwrap();
        for _ in 0..2 {
            sharing
                .edit_shared(
                    &share.token,
                    &TimelineEdit::Remove {
                        slot_id: "d1-0900-0".into(),
                        activity_index: 0,
                    },
                )
                .await
                .unwrap();
        }

        let err = sharing
            .review_suggestion(&Access::Owner("owner".into()), &suggestion.id, ReviewAction::Accept, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Conflict(_)));
        let stored = sharing.get_suggestion(&suggestion.id).await.unwrap();
        assert_eq!(stored.status, SuggestionStatus::Pending);
    }

    #[tokio::test]
    async fn test_edit_requires_edit_link_and_notifies_owner() {
        let sharing = coordinator();
        let suggest_link = sharing.create_share(request(Permission::Suggest)).await.unwrap();
        let edit = TimelineEdit::Select {
            slot_id: "d1-0900-0".into(),
            index: 2,
        };
        let err = sharing.edit_shared(&suggest_link.token, &edit).await.unwrap_err();
        assert!(matches!(err, PlannerError::Permission(_)));

        let edit_link = sharing.create_share(request(Permission::Edit)).await.unwrap();
        let plan = sharing.edit_shared(&edit_link.token, &edit).await.unwrap();
        assert_eq!(plan.slot("d1-0900-0").unwrap().selected, Some(2));

        let view = sharing.read_share(&edit_link.token).await.unwrap();
        assert!(view.permissions.can_edit);
        assert_eq!(view.live_plan.unwrap().slot("d1-0900-0").unwrap().selected, Some(2));

        let unread = sharing.notifications("owner", true).await.unwrap();
        let update = unread.iter().find(|n| n.kind == NotificationKind::TripUpdated).unwrap();
        let read = sharing.mark_notification_read("owner", &update.id).await.unwrap();
        assert!(read.read);
        assert!(sharing.mark_notification_read("friend", &update.id).await.is_err());
    }

    #[tokio::test]
    async fn test_reshare_keeps_collaborator_changes() {
        let sharing = coordinator();
        let owner = Access::Owner("owner".into());
        let edit_link = sharing.create_share(request(Permission::Edit)).await.unwrap();
        let suggestion = sharing
            .create_suggestion(&edit_link.token, suggest("d1-0900-0", 0, "picked"))
            .await
            .unwrap();
        sharing
            .review_suggestion(&owner, &suggestion.id, ReviewAction::Accept, None)
            .await
            .unwrap();

        // The owner's session plan has not moved, so the trip's plan is shared
        let view = sharing.create_share(request(Permission::View)).await.unwrap();
        assert_eq!(view.snapshot.slot("d1-0900-0").unwrap().options[0].id, "picked");
        let trip = sharing.trip("owner", "sess-1").await.unwrap();
        assert_eq!(trip.plan.slot("d1-0900-0").unwrap().options[0].id, "picked");
        assert!(trip.has_collaborator_changes());

        // Both sides moved
        let mut moved = request(Permission::View);
        moved.plan.revision = 1;
        moved.plan.time_slots[2].selected = Some(1);
        assert!(matches!(
            sharing.create_share(moved).await.unwrap_err(),
            PlannerError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_adopt_plan_resyncs_trip() {
        let sharing = coordinator();
        let edit_link = sharing.create_share(request(Permission::Edit)).await.unwrap();
        sharing
            .edit_shared(
                &edit_link.token,
                &TimelineEdit::Select {
                    slot_id: "d2-0900-2".into(),
                    index: 2,
                },
            )
            .await
            .unwrap();
        let trip = sharing.trip("owner", "sess-1").await.unwrap();
        assert_eq!(trip.plan.revision, 1);

        let mut pulled = trip.plan.clone();
        pulled.revision = 2;
        assert!(matches!(
            sharing.adopt_plan("owner", "sess-1", pulled.clone(), 0).await.unwrap_err(),
            PlannerError::Conflict(_)
        ));
        assert!(matches!(
            sharing.adopt_plan("intruder", "sess-1", pulled.clone(), 1).await.unwrap_err(),
            PlannerError::Permission(_)
        ));
        let synced = sharing.adopt_plan("owner", "sess-1", pulled.clone(), 1).await.unwrap();
        assert!(!synced.has_collaborator_changes());

        // The owner's next edit now wins on reshare
        let mut next = request(Permission::View);
        next.plan = pulled;
        next.plan.revision = 3;
        next.plan.time_slots[0].selected = Some(1);
        let share = sharing.create_share(next).await.unwrap();
        assert_eq!(share.snapshot.slot("d1-0900-0").unwrap().selected, Some(1));
        assert_eq!(share.snapshot.slot("d2-0900-2").unwrap().selected, Some(2));
    }

    #[tokio::test]
    async fn test_other_owner_cannot_reshare() {
        let sharing = coordinator();
        sharing.create_share(request(Permission::View)).await.unwrap();
        let mut req = request(Permission::Edit);
        req.owner_id = "intruder".into();
        assert!(matches!(
            sharing.create_share(req).await.unwrap_err(),
            PlannerError::Permission(_)
        ));
    }
}
