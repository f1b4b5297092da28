//! StateManager - actor that owns the TripStore
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use tripstore::{Filter, IndexValue, Store};

use crate::domain::{Notification, Session, Share, Suggestion, Trip};

use super::messages::{StateCommand, StateError, StateResponse};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over an on-disk store
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let mut store = Store::open(store_path.as_ref())?;

        let session_count = store.rebuild_indexes::<Session>()?;
        let share_count = store.rebuild_indexes::<Share>()?;
        let suggestion_count = store.rebuild_indexes::<Suggestion>()?;
        let trip_count = store.rebuild_indexes::<Trip>()?;
        let notification_count = store.rebuild_indexes::<Notification>()?;
        info!(
            session_count,
            share_count, suggestion_count, trip_count, notification_count, "Rebuilt indexes for all record collections"
        );

        Ok(Self::start(store))
    }

    /// Spawn an actor over a throwaway in-memory store
    pub fn spawn_in_memory() -> eyre::Result<Self> {
        debug!("spawn_in_memory: called");
        Ok(Self::start(Store::in_memory()?))
    }

    fn start(store: Store) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    // === Session operations ===

    pub async fn get_session(&self, id: &str) -> StateResponse<Option<Session>> {
        debug!(%id, "get_session: called");
        let id = id.to_string();
        self.call(|reply| StateCommand::GetSession { id, reply }).await
    }

    pub async fn put_session(&self, session: Session) -> StateResponse<()> {
        debug!(session_id = %session.id, turns = session.turns.len(), "put_session: called");
        self.call(|reply| StateCommand::PutSession {
            session: Box::new(session),
            reply,
        })
        .await
    }

    pub async fn delete_session(&self, id: &str) -> StateResponse<bool> {
        debug!(%id, "delete_session: called");
        let id = id.to_string();
        self.call(|reply| StateCommand::DeleteSession { id, reply }).await
    }

    /// Remove sessions idle since before `cutoff_ms`, returning their ids
    pub async fn expire_sessions(&self, cutoff_ms: i64) -> StateResponse<Vec<String>> {
        debug!(cutoff_ms, "expire_sessions: called");
        self.call(|reply| StateCommand::ExpireSessions { cutoff_ms, reply }).await
    }

    pub async fn list_sessions(&self) -> StateResponse<Vec<Session>> {
        debug!("list_sessions: called");
        self.call(|reply| StateCommand::ListSessions { reply }).await
    }

    // === Trip operations ===

    pub async fn get_trip(&self, id: &str) -> StateResponse<Option<Trip>> {
        debug!(%id, "get_trip: called");
        let id = id.to_string();
        self.call(|reply| StateCommand::GetTrip { id, reply }).await
    }

    /// Get a Trip by ID, returning error if not found
    pub async fn get_trip_required(&self, id: &str) -> StateResponse<Trip> {
        self.get_trip(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("Trip {}", id)))
    }

    pub async fn put_trip(&self, trip: Trip) -> StateResponse<()> {
        debug!(trip_id = %trip.id, revision = trip.plan.revision, "put_trip: called");
        self.call(|reply| StateCommand::PutTrip {
            trip: Box::new(trip),
            reply,
        })
        .await
    }

    // === Share operations ===

    pub async fn create_share(&self, share: Share) -> StateResponse<String> {
        debug!(trip_id = %share.trip_id, permission = ?share.permission_level, "create_share: called");
        self.call(|reply| StateCommand::CreateShare {
            share: Box::new(share),
            reply,
        })
        .await
    }

    pub async fn get_share(&self, token: &str) -> StateResponse<Option<Share>> {
        debug!("get_share: called");
        let token = token.to_string();
        self.call(|reply| StateCommand::GetShare { token, reply }).await
    }

    pub async fn put_share(&self, share: Share) -> StateResponse<()> {
        debug!(trip_id = %share.trip_id, view_count = share.view_count, "put_share: called");
        self.call(|reply| StateCommand::PutShare {
            share: Box::new(share),
            reply,
        })
        .await
    }

    pub async fn list_shares(&self, trip_id: &str) -> StateResponse<Vec<Share>> {
        debug!(%trip_id, "list_shares: called");
        let trip_id = trip_id.to_string();
        self.call(|reply| StateCommand::ListShares { trip_id, reply }).await
    }

    // === Suggestion operations ===

    pub async fn create_suggestion(&self, suggestion: Suggestion) -> StateResponse<String> {
        debug!(suggestion_id = %suggestion.id, trip_id = %suggestion.shared_trip_id, "create_suggestion: called");
        self.call(|reply| StateCommand::CreateSuggestion {
            suggestion: Box::new(suggestion),
            reply,
        })
        .await
    }

    pub async fn get_suggestion(&self, id: &str) -> StateResponse<Option<Suggestion>> {
        debug!(%id, "get_suggestion: called");
        let id = id.to_string();
        self.call(|reply| StateCommand::GetSuggestion { id, reply }).await
    }

    pub async fn put_suggestion(&self, suggestion: Suggestion) -> StateResponse<()> {
        debug!(suggestion_id = %suggestion.id, status = ?suggestion.status, "put_suggestion: called");
        self.call(|reply| StateCommand::PutSuggestion {
            suggestion: Box::new(suggestion),
            reply,
        })
        .await
    }

    pub async fn list_suggestions(
        &self,
        trip_id: &str,
        status_filter: Option<String>,
    ) -> StateResponse<Vec<Suggestion>> {
        debug!(%trip_id, ?status_filter, "list_suggestions: called");
        let trip_id = trip_id.to_string();
        self.call(|reply| StateCommand::ListSuggestions {
            trip_id,
            status_filter,
            reply,
        })
        .await
    }

    // === Notification operations ===

    pub async fn create_notification(&self, notification: Notification) -> StateResponse<String> {
        debug!(user_id = %notification.user_id, kind = ?notification.kind, "create_notification: called");
        self.call(|reply| StateCommand::CreateNotification { notification, reply })
            .await
    }

    pub async fn get_notification(&self, id: &str) -> StateResponse<Option<Notification>> {
        debug!(%id, "get_notification: called");
        let id = id.to_string();
        self.call(|reply| StateCommand::GetNotification { id, reply }).await
    }

    pub async fn put_notification(&self, notification: Notification) -> StateResponse<()> {
        debug!(id = %notification.id, read = notification.read, "put_notification: called");
        self.call(|reply| StateCommand::PutNotification { notification, reply })
            .await
    }

    pub async fn list_notifications(&self, user_id: &str, unread_only: bool) -> StateResponse<Vec<Notification>> {
        debug!(%user_id, unread_only, "list_notifications: called");
        let user_id = user_id.to_string();
        self.call(|reply| StateCommand::ListNotifications {
            user_id,
            unread_only,
            reply,
        })
        .await
    }
}

fn store_err(e: eyre::Report) -> StateError {
    StateError::StoreError(e.to_string())
}

/// The actor loop that processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            // Session operations
            StateCommand::GetSession { id, reply } => {
                debug!(%id, "actor_loop: GetSession command");
                let _ = reply.send(store.get(&id).map_err(store_err));
            }
            StateCommand::PutSession { session, reply } => {
                debug!(session_id = %session.id, "actor_loop: PutSession command");
                let _ = reply.send(store.update(*session).map_err(store_err));
            }
            StateCommand::DeleteSession { id, reply } => {
                debug!(%id, "actor_loop: DeleteSession command");
                let _ = reply.send(store.delete::<Session>(&id).map_err(store_err));
            }
            StateCommand::ExpireSessions { cutoff_ms, reply } => {
                debug!(cutoff_ms, "actor_loop: ExpireSessions command");
                let result = store.delete_older_than::<Session>(cutoff_ms).map_err(store_err);
                if let Ok(ids) = &result {
                    info!(count = ids.len(), "Expired idle sessions");
                }
                let _ = reply.send(result);
            }
            StateCommand::ListSessions { reply } => {
                debug!("actor_loop: ListSessions command");
                let _ = reply.send(store.list(&[]).map_err(store_err));
            }

            // Trip operations
            StateCommand::GetTrip { id, reply } => {
                debug!(%id, "actor_loop: GetTrip command");
                let _ = reply.send(store.get(&id).map_err(store_err));
            }
            StateCommand::PutTrip { trip, reply } => {
                debug!(trip_id = %trip.id, "actor_loop: PutTrip command");
                let _ = reply.send(store.update(*trip).map_err(store_err));
            }

            // Share operations
            StateCommand::CreateShare { share, reply } => {
                debug!(trip_id = %share.trip_id, "actor_loop: CreateShare command");
                let _ = reply.send(store.create(*share).map_err(store_err));
            }
            StateCommand::GetShare { token, reply } => {
                debug!("actor_loop: GetShare command");
                let _ = reply.send(store.get(&token).map_err(store_err));
            }
            StateCommand::PutShare { share, reply } => {
                debug!(trip_id = %share.trip_id, "actor_loop: PutShare command");
                let _ = reply.send(store.update(*share).map_err(store_err));
            }
            StateCommand::ListShares { trip_id, reply } => {
                debug!(%trip_id, "actor_loop: ListShares command");
                let filters = [Filter::eq("trip_id", IndexValue::String(trip_id))];
                let _ = reply.send(store.list(&filters).map_err(store_err));
            }

            // Suggestion operations
            StateCommand::CreateSuggestion { suggestion, reply } => {
                debug!(suggestion_id = %suggestion.id, "actor_loop: CreateSuggestion command");
                let _ = reply.send(store.create(*suggestion).map_err(store_err));
            }
            StateCommand::GetSuggestion { id, reply } => {
                debug!(%id, "actor_loop: GetSuggestion command");
                let _ = reply.send(store.get(&id).map_err(store_err));
            }
            StateCommand::PutSuggestion { suggestion, reply } => {
                debug!(suggestion_id = %suggestion.id, "actor_loop: PutSuggestion command");
                let _ = reply.send(store.update(*suggestion).map_err(store_err));
            }
            StateCommand::ListSuggestions {
                trip_id,
                status_filter,
                reply,
            } => {
                debug!(%trip_id, ?status_filter, "actor_loop: ListSuggestions command");
                let mut filters = vec![Filter::eq("trip_id", IndexValue::String(trip_id))];
                if let Some(status) = status_filter {
                    filters.push(Filter::eq("status", IndexValue::String(status)));
                }
                let _ = reply.send(store.list(&filters).map_err(store_err));
            }

            // Notification operations
            StateCommand::CreateNotification { notification, reply } => {
                debug!(id = %notification.id, "actor_loop: CreateNotification command");
                let _ = reply.send(store.create(notification).map_err(store_err));
            }
            StateCommand::GetNotification { id, reply } => {
                debug!(%id, "actor_loop: GetNotification command");
                let _ = reply.send(store.get(&id).map_err(store_err));
            }
            StateCommand::PutNotification { notification, reply } => {
                debug!(id = %notification.id, "actor_loop: PutNotification command");
                let _ = reply.send(store.update(notification).map_err(store_err));
            }
            StateCommand::ListNotifications {
                user_id,
                unread_only,
                reply,
            } => {
                debug!(%user_id, unread_only, "actor_loop: ListNotifications command");
                let mut filters = vec![Filter::eq("user_id", IndexValue::String(user_id))];
                if unread_only {
                    filters.push(Filter::eq("read", IndexValue::Bool(false)));
                }
                let _ = reply.send(store.list(&filters).map_err(store_err));
            }
        }
    }

    debug!("StateManager actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NotificationKind, Permission, SuggestionStatus};
    use crate::domain::plan::fixtures::sample_plan;
    use tempfile::TempDir;

    fn share(token: &str, trip_id: &str) -> Share {
        Share {
            token: token.to_string(),
            trip_id: trip_id.to_string(),
            owner_id: "owner".to_string(),
            owner_name: "Owner".to_string(),
            permission_level: Permission::Suggest,
            is_public: false,
            expires_at: None,
            view_count: 0,
            revoked: false,
            snapshot: sample_plan(),
            created_at: 1,
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn test_session_round_trip_and_expire() {
        let state = StateManager::spawn_in_memory().unwrap();

        let mut old = Session::with_id("sess-old");
        old.updated_at = 1_000;
        let mut fresh = Session::with_id("sess-new");
        fresh.updated_at = 5_000;
        state.put_session(old).await.unwrap();
        state.put_session(fresh.clone()).await.unwrap();

        assert_eq!(state.get_session("sess-new").await.unwrap(), Some(fresh));
        assert_eq!(state.list_sessions().await.unwrap().len(), 2);

        let expired = state.expire_sessions(2_000).await.unwrap();
        assert_eq!(expired, vec!["sess-old".to_string()]);
        assert!(state.get_session("sess-old").await.unwrap().is_none());

        assert!(state.delete_session("sess-new").await.unwrap());
        assert!(!state.delete_session("sess-new").await.unwrap());
    }

    #[tokio::test]
    async fn test_shares_by_trip() {
        let state = StateManager::spawn_in_memory().unwrap();
        state.create_share(share("tok-a", "trip-1")).await.unwrap();
        state.create_share(share("tok-b", "trip-1")).await.unwrap();
        state.create_share(share("tok-c", "trip-2")).await.unwrap();

        // Tokens are unique
        assert!(state.create_share(share("tok-a", "trip-1")).await.is_err());

        let shares = state.list_shares("trip-1").await.unwrap();
        assert_eq!(shares.len(), 2);
        assert!(state.get_trip_required("trip-1").await.is_err());
    }

    #[tokio::test]
    async fn test_suggestions_and_notifications_filters() {
        let state = StateManager::spawn_in_memory().unwrap();
        let plan = sample_plan();
        let slot = &plan.time_slots[0];
        let mut suggestion = Suggestion {
            id: "sugg-1".to_string(),
            shared_trip_id: "trip-1".to_string(),
            share_token: "tok".to_string(),
            day: 1,
            time_slot_id: slot.id.clone(),
            original_activity_index: 0,
            original_activity: slot.options[0].clone(),
            suggested_activity: slot.options[1].clone(),
            reason: None,
            suggested_by_id: "friend".to_string(),
            suggested_by_name: "Friend".to_string(),
            status: SuggestionStatus::Pending,
            review_note: None,
            created_at: 1,
            reviewed_at: None,
            updated_at: 1,
        };
        state.create_suggestion(suggestion.clone()).await.unwrap();
        let pending = state
            .list_suggestions("trip-1", Some("pending".to_string()))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        suggestion.status = SuggestionStatus::Rejected;
        state.put_suggestion(suggestion).await.unwrap();
        assert!(
            state
                .list_suggestions("trip-1", Some("pending".to_string()))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(state.list_suggestions("trip-1", None).await.unwrap().len(), 1);

        let note = Notification::new("owner", NotificationKind::NewSuggestion, "trip-1", "hello");
        let note_id = state.create_notification(note.clone()).await.unwrap();
        assert_eq!(state.list_notifications("owner", true).await.unwrap().len(), 1);

        let mut read = state.get_notification(&note_id).await.unwrap().unwrap();
        read.read = true;
        state.put_notification(read).await.unwrap();
        assert!(state.list_notifications("owner", true).await.unwrap().is_empty());
        assert_eq!(state.list_notifications("owner", false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_on_disk_store_survives_restart() {
        let dir = TempDir::new().unwrap();
        {
            let state = StateManager::spawn(dir.path()).unwrap();
            state.put_session(Session::with_id("sess-disk")).await.unwrap();
        }
        let state = StateManager::spawn(dir.path()).unwrap();
        assert!(state.get_session("sess-disk").await.unwrap().is_some());
    }
}
