//! TripService - the boundary surface over sessions, planning and sharing
//!
//! Wires configuration into the stores, parser, gateway, assembler, engine
//! and sharing coordinator. The CLI and any transport adapter talk to this
//! type only.

use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::{Config, IntentParserKind, ReviserKind};
use crate::domain::{Activity, Notification, Permission, Plan, Session, Share, SlotPatch, Suggestion, SuggestionStatus};
use crate::error::{PlannerError, PlannerResult};
use crate::events::{EventBus, PlanProgress, ProgressError};
use crate::intent::{IntentParser, create_parser};
use crate::llm::{LlmClient, create_client};
use crate::planner::{PlanAssembler, Revision, create_reviser};
use crate::provider::{ProviderGateway, create_gateway};
use crate::session::{SessionEngine, TurnOutcome};
use crate::sharing::{Access, NewShare, NewSuggestion, ReviewAction, SharedView, SharingCoordinator, SuggestionList};
use crate::state::StateManager;
use crate::timeline::TimelineEdit;

pub struct TripService {
    config: Config,
    bus: Arc<EventBus>,
    engine: SessionEngine,
    sharing: SharingCoordinator,
}

impl TripService {
    /// Build the service over the on-disk store named in the config
    pub fn open(config: Config) -> Result<Self> {
        debug!(path = %config.storage.path, "open: called");
        let state = StateManager::spawn(&config.storage.path)?;
        Self::with_state(config, state)
    }

    /// Build the service over a throwaway in-memory store
    pub fn in_memory(config: Config) -> Result<Self> {
        let state = StateManager::spawn_in_memory()?;
        Self::with_state(config, state)
    }

    fn with_state(config: Config, state: StateManager) -> Result<Self> {
        let needs_llm = config.intent.parser == IntentParserKind::Llm || config.planning.reviser == ReviserKind::Llm;
        let llm: Option<Arc<dyn LlmClient>> = if needs_llm {
            Some(create_client(&config.llm).context("Failed to create LLM client")?)
        } else {
            None
        };
        let parser = create_parser(&config.intent, llm.clone()).context("Failed to create intent parser")?;
        let gateway = create_gateway(&config.providers).context("Failed to create provider gateway")?;
        Self::with_parts(config, state, parser, gateway, llm)
    }

    /// Assemble from explicit collaborators
    pub fn with_parts(
        config: Config,
        state: StateManager,
        parser: Arc<dyn IntentParser>,
        gateway: Arc<dyn ProviderGateway>,
        llm: Option<Arc<dyn LlmClient>>,
    ) -> Result<Self> {
        let reviser = create_reviser(config.planning.reviser, llm).context("Failed to create reviser")?;
        let bus = Arc::new(EventBus::new(config.progress.channel_capacity.max(16)));
        let assembler = PlanAssembler::new(
            gateway,
            reviser,
            config.planning.clone(),
            config.providers.timeouts(),
        );
        let engine = SessionEngine::new(
            Arc::new(state.clone()),
            parser,
            Arc::new(assembler),
            Arc::clone(&bus),
            config.intent.timeout(),
        );
        let sharing = SharingCoordinator::new(
            state,
            Arc::clone(&bus),
            config.sharing.clone(),
            config.planning.daily_transport_estimate,
        );
        info!(
            parser = ?config.intent.parser,
            providers = ?config.providers.kind,
            reviser = ?config.planning.reviser,
            "TripService ready"
        );
        Ok(Self {
            config,
            bus,
            engine,
            sharing,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    pub fn sharing(&self) -> &SharingCoordinator {
        &self.sharing
    }

    // === Conversation ===

    pub async fn start_conversation(&self, text: &str) -> PlannerResult<TurnOutcome> {
        self.engine.start(text).await
    }

    pub async fn continue_conversation(&self, session_id: &str, text: &str) -> PlannerResult<TurnOutcome> {
        self.engine.process_turn(session_id, text).await
    }

    pub async fn session(&self, session_id: &str) -> PlannerResult<Session> {
        self.engine.session(session_id).await
    }

    pub async fn plan(&self, session_id: &str) -> PlannerResult<Plan> {
        self.session(session_id)
            .await?
            .current_plan
            .ok_or_else(|| PlannerError::NotFound(format!("plan for session {session_id}")))
    }

    pub async fn expire_sessions(&self, older_than: Option<Duration>) -> PlannerResult<Vec<String>> {
        let ttl = older_than.unwrap_or(Duration::from_secs(self.config.sessions.ttl_secs));
        self.engine.expire(ttl).await
    }

    // === Planning ===

    pub async fn plan_direct(&self, slots: SlotPatch) -> PlannerResult<TurnOutcome> {
        self.engine.plan_direct(slots).await
    }

    pub async fn revise_plan(&self, session_id: &str, instruction: &str) -> PlannerResult<Revision> {
        self.engine.revise(session_id, instruction).await
    }

    pub async fn edit(&self, session_id: &str, edit: &TimelineEdit) -> PlannerResult<Plan> {
        self.engine.edit(session_id, edit).await
    }

    pub async fn import_plan(&self, session_id: &str, payload: &str) -> PlannerResult<Plan> {
        self.engine.import_plan(session_id, payload).await
    }

    /// Fresh options for one slot, ranked by the session's preferences
    pub async fn alternatives(&self, session_id: &str, slot_id: &str) -> PlannerResult<Vec<Activity>> {
        let session = self.session(session_id).await?;
        let plan = session
            .current_plan
            .as_ref()
            .ok_or_else(|| PlannerError::NotFound(format!("plan for session {session_id}")))?;
        self.engine
            .assembler()
            .alternatives(plan, slot_id, &session.collected_slots.preferences)
            .await
    }

    /// Stage events for one session, torn down after the configured ceiling
    pub fn progress(&self, session_id: &str) -> PlannerResult<mpsc::Receiver<PlanProgress>> {
        let ceiling = Duration::from_secs(self.config.progress.ceiling_secs);
        self.bus
            .progress_stream(session_id, ceiling, self.config.progress.channel_capacity)
            .map_err(|e: ProgressError| PlannerError::Conflict(e.to_string()))
    }

    // === Sharing ===

    /// Share the session's current plan
    pub async fn create_share(
        &self,
        session_id: &str,
        owner_id: &str,
        owner_name: &str,
        permission: Permission,
        is_public: bool,
        expires_in_days: Option<u32>,
    ) -> PlannerResult<Share> {
        let plan = self.plan(session_id).await?;
        self.sharing
            .create_share(NewShare {
                trip_id: session_id.to_string(),
                owner_id: owner_id.to_string(),
                owner_name: owner_name.to_string(),
                plan,
                permission,
                is_public,
                expires_in_days,
            })
            .await
    }

    /// Take the shared trip's live plan, with collaborator changes, into the session
    pub async fn pull_trip(&self, session_id: &str, owner_id: &str) -> PlannerResult<Plan> {
        debug!(%session_id, %owner_id, "pull_trip: called");
        let trip = self.sharing.trip(owner_id, session_id).await?;
        let payload = serde_json::to_string(&trip.plan).map_err(|e| PlannerError::Store(e.to_string()))?;
        let plan = self.engine.import_plan(session_id, &payload).await?;
        self.sharing
            .adopt_plan(owner_id, session_id, plan.clone(), trip.plan.revision)
            .await?;
        Ok(plan)
    }

    pub fn share_url(&self, token: &str) -> String {
        self.sharing.share_url(token)
    }

    pub async fn read_share(&self, token: &str) -> PlannerResult<SharedView> {
        self.sharing.read_share(token).await
    }

    pub async fn list_shares(&self, trip_id: &str) -> PlannerResult<Vec<Share>> {
        self.sharing.list_shares(trip_id).await
    }

    pub async fn revoke_share(&self, owner_id: &str, token: &str) -> PlannerResult<Share> {
        self.sharing.revoke_share(owner_id, token).await
    }

    pub async fn create_suggestion(&self, token: &str, request: NewSuggestion) -> PlannerResult<Suggestion> {
        self.sharing.create_suggestion(token, request).await
    }

    pub async fn review_suggestion(
        &self,
        access: &Access,
        suggestion_id: &str,
        action: ReviewAction,
        note: Option<String>,
    ) -> PlannerResult<Suggestion> {
        self.sharing.review_suggestion(access, suggestion_id, action, note).await
    }

    pub async fn list_suggestions(&self, trip_id: &str, status: Option<SuggestionStatus>) -> PlannerResult<SuggestionList> {
        self.sharing.list_suggestions(trip_id, status).await
    }

    pub async fn edit_shared(&self, token: &str, edit: &TimelineEdit) -> PlannerResult<Plan> {
        self.sharing.edit_shared(token, edit).await
    }

    pub async fn notifications(&self, user_id: &str, unread_only: bool) -> PlannerResult<Vec<Notification>> {
        self.sharing.notifications(user_id, unread_only).await
    }

    pub async fn mark_notification_read(&self, user_id: &str, id: &str) -> PlannerResult<Notification> {
        self.sharing.mark_notification_read(user_id, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlanStage;

    #[tokio::test]
    async fn test_progress_stream_follows_a_turn() {
        let service = TripService::in_memory(Config::default()).unwrap();
        let first = service.start_conversation("From Istanbul to Berlin").await.unwrap();
        let id = first.session_id;

        let mut rx = service.progress(&id).unwrap();
        assert!(matches!(service.progress(&id), Err(PlannerError::Conflict(_))));

        service
            .continue_conversation(&id, "2025-11-20 to 2025-11-23 for 2 adults")
            .await
            .unwrap();
        let mut stages = Vec::new();
        while let Some(progress) = rx.recv().await {
            stages.push(progress.stage);
        }
        assert_eq!(stages.first(), Some(&PlanStage::Parsing));
        assert_eq!(stages.last(), Some(&PlanStage::Complete));
    }

    #[tokio::test]
    async fn test_accepted_suggestion_survives_reshare_and_pull() {
        let service = TripService::in_memory(Config::default()).unwrap();
        let outcome = service
            .plan_direct(SlotPatch {
                origin: Some("Istanbul".into()),
                destination: Some("Berlin".into()),
                start_date: chrono::NaiveDate::from_ymd_opt(2025, 11, 20),
                end_date: chrono::NaiveDate::from_ymd_opt(2025, 11, 23),
                adults: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        let id = outcome.session_id;
        let slot = outcome.plan.unwrap().time_slots[0].clone();

        let link = service
            .create_share(&id, "owner", "Olivia", Permission::Edit, false, None)
            .await
            .unwrap();
        let mut replacement = slot.options[0].clone();
        replacement.id = "street-food".into();
        replacement.title = "Street food tour".into();
        let suggestion = service
            .create_suggestion(
                &link.token,
                NewSuggestion {
                    day: slot.day,
                    time_slot_id: slot.id.clone(),
                    activity_index: 0,
                    original_activity: None,
                    suggested_activity: replacement,
                    reason: None,
                    suggested_by_id: "friend".into(),
                    suggested_by_name: "Sam".into(),
                },
            )
            .await
            .unwrap();
        service
            .review_suggestion(&Access::Owner("owner".into()), &suggestion.id, ReviewAction::Accept, None)
            .await
            .unwrap();

        let view = service
            .create_share(&id, "owner", "Olivia", Permission::View, false, None)
            .await
            .unwrap();
        assert_eq!(view.snapshot.slot(&slot.id).unwrap().options[0].id, "street-food");
        let trip = service.sharing().trip("owner", &id).await.unwrap();
        assert_eq!(trip.plan.slot(&slot.id).unwrap().options[0].id, "street-food");

        let pulled = service.pull_trip(&id, "owner").await.unwrap();
        assert_eq!(pulled.slot(&slot.id).unwrap().options[0].id, "street-food");
        assert_eq!(service.plan(&id).await.unwrap(), pulled);
        assert!(!service.sharing().trip("owner", &id).await.unwrap().has_collaborator_changes());
    }

    #[tokio::test]
    async fn test_alternatives_for_session() {
        let service = TripService::in_memory(Config::default()).unwrap();
        let outcome = service
            .plan_direct(SlotPatch {
                origin: Some("Istanbul".into()),
                destination: Some("Berlin".into()),
                start_date: chrono::NaiveDate::from_ymd_opt(2025, 11, 20),
                end_date: chrono::NaiveDate::from_ymd_opt(2025, 11, 23),
                adults: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        let slot = outcome.plan.unwrap().time_slots[0].id.clone();
        let options = service.alternatives(&outcome.session_id, &slot).await.unwrap();
        assert!(!options.is_empty());
        assert!(service.alternatives("sess-nope", &slot).await.is_err());
    }
}
