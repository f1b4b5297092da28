//! SessionEngine - the slot-filling dialogue state machine
//!
//! Each turn runs under the session's lock: load, parse, act, persist. A
//! turn has at most one effect on slots and plan; when parsing or planning
//! fails the stored slots and plan stay as they were.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::locks::KeyedLocks;
use super::store::SessionStore;
use crate::domain::{Plan, Role, Session, SlotName, SlotPatch};
use crate::error::{PlannerError, PlannerResult};
use crate::events::{EventBus, EventEmitter, PlanStage};
use crate::intent::{Intent, IntentError, IntentParser};
use crate::planner::{PlanAssembler, Revision};
use crate::timeline::{self, TimelineEdit};

const RETRY_SHORTLY: &str = "I'm getting a lot of requests right now. Please try again shortly.";
const RETRY_GENERIC: &str = "Sorry, I couldn't process that message. Could you try again?";
const ASK_ANYTHING: &str = "Could you tell me a bit more about the trip you have in mind?";

/// What one turn produced; always carries the latest plan
#[derive(Debug, Clone, serde::Serialize)]
pub struct TurnOutcome {
    pub session_id: String,
    pub assistant_text: String,
    pub plan: Option<Plan>,
    pub needs_more_info: bool,
    pub complete: bool,
}

pub struct SessionEngine {
    store: Arc<dyn SessionStore>,
    parser: Arc<dyn IntentParser>,
    assembler: Arc<PlanAssembler>,
    bus: Arc<EventBus>,
    locks: KeyedLocks,
    intent_timeout: Duration,
}

/// Reply text for a turn that did not produce a plan change
struct Reply {
    text: String,
    needs_more_info: bool,
}

impl Reply {
    fn say(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            needs_more_info: false,
        }
    }

    fn ask(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            needs_more_info: true,
        }
    }
}

fn ask_missing(session: &Session) -> Reply {
    match session.collected_slots.missing_required().first() {
        Some(slot) => Reply::ask(slot.question()),
        None => Reply::ask(ASK_ANYTHING),
    }
}

fn plan_ready_text(plan: &Plan, regenerated: bool) -> String {
    let mut text = if regenerated {
        format!("I've rebuilt your itinerary. {}.", plan.summary)
    } else {
        format!("Your itinerary is ready! {}.", plan.summary)
    };
    if !plan.warnings.is_empty() {
        text.push_str(&format!(" Note: {}.", plan.warnings.join("; ")));
    }
    text
}

fn failure_text(err: &PlannerError) -> String {
    match err {
        PlannerError::RateLimited { .. } => RETRY_SHORTLY.to_string(),
        PlannerError::Validation(msg) => format!("I can't plan that yet: {msg}."),
        PlannerError::Provider(_) => {
            "I couldn't reach any travel data sources just now. Please try again in a moment.".to_string()
        }
        other => format!("Something went wrong while planning: {other}."),
    }
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        parser: Arc<dyn IntentParser>,
        assembler: Arc<PlanAssembler>,
        bus: Arc<EventBus>,
        intent_timeout: Duration,
    ) -> Self {
        Self {
            store,
            parser,
            assembler,
            bus,
            locks: KeyedLocks::new(),
            intent_timeout,
        }
    }

    pub fn assembler(&self) -> &PlanAssembler {
        &self.assembler
    }

    fn emitter(&self, session_id: &str) -> EventEmitter {
        self.bus.emitter_for(session_id)
    }

    /// Open a new session and process its first message
    pub async fn start(&self, text: &str) -> PlannerResult<TurnOutcome> {
        let session = Session::new();
        debug!(session_id = %session.id, "start: called");
        let id = session.id.clone();
        self.store.put(session).await?;
        self.process_turn(&id, text).await
    }

    pub async fn session(&self, session_id: &str) -> PlannerResult<Session> {
        self.store
            .get(session_id)
            .await?
            .ok_or_else(|| PlannerError::NotFound(format!("session {session_id}")))
    }

    /// Run one conversational turn
    pub async fn process_turn(&self, session_id: &str, text: &str) -> PlannerResult<TurnOutcome> {
        let _guard = self.locks.lock(session_id).await;
        debug!(%session_id, len = text.len(), "process_turn: called");
        let stored = self.session(session_id).await?;
        let events = self.emitter(session_id);
        let mut session = stored.clone();
        session.push_turn(Role::User, text);

        events.stage(PlanStage::Parsing);
        let plan_exists = session.plan_generated && session.current_plan.is_some();
        let parsed = tokio::time::timeout(
            self.intent_timeout,
            self.parser.parse(text, &session.collected_slots, plan_exists),
        )
        .await
        .unwrap_or(Err(IntentError::Timeout(self.intent_timeout)));

        let reply = match parsed {
            Ok(intent) => {
                debug!(kind = intent.kind(), "process_turn: intent parsed");
                self.act(&mut session, intent, &events).await
            }
            Err(IntentError::RateLimited { retry_after }) => {
                warn!(%session_id, ?retry_after, "process_turn: intent parser rate limited");
                Reply::say(RETRY_SHORTLY)
            }
            Err(e) => {
                error!(%session_id, error = %e, "process_turn: intent parsing failed");
                Reply::say(RETRY_GENERIC)
            }
        };

        session.push_turn(Role::Assistant, reply.text.clone());
        self.store.put(session.clone()).await?;

        let complete = !reply.needs_more_info && session.plan_generated && session.current_plan.is_some();
        events.turn_completed(reply.needs_more_info, complete);
        Ok(TurnOutcome {
            session_id: session.id,
            assistant_text: reply.text,
            plan: session.current_plan,
            needs_more_info: reply.needs_more_info,
            complete,
        })
    }

    async fn act(&self, session: &mut Session, intent: Intent, events: &EventEmitter) -> Reply {
        match intent {
            Intent::NeedMore { question } => Reply::ask(question),
            Intent::SlotUpdate { slots } => self.update_slots(session, slots, events).await,
            Intent::Revision { instruction } => {
                let Some(plan) = session.current_plan.as_ref().filter(|_| session.plan_generated) else {
                    debug!("act: revision before any plan, asking for details");
                    return ask_missing(session);
                };
                match self.assembler.revise(plan, &instruction, events).await {
                    Ok(revision) => {
                        if revision.changed {
                            info!(session_id = %session.id, revision = revision.plan.revision, "act: plan revised");
                            session.current_plan = Some(revision.plan);
                        }
                        Reply::say(revision.summary)
                    }
                    Err(e) => {
                        warn!(session_id = %session.id, error = %e, "act: revision failed, plan unchanged");
                        Reply::say(failure_text(&e))
                    }
                }
            }
        }
    }

    async fn update_slots(&self, session: &mut Session, patch: SlotPatch, events: &EventEmitter) -> Reply {
        let previous = session.collected_slots.clone();
        let changed = session.collected_slots.merge(patch);
        debug!(?changed, "update_slots: merged");

        if !session.collected_slots.is_complete() {
            return ask_missing(session);
        }
        let regenerate = session.plan_generated && changed.iter().any(|s| s.is_required() || *s == SlotName::Children);
        if session.plan_generated && !regenerate {
            return if changed.is_empty() {
                Reply::say("Got it. Your itinerary is unchanged.")
            } else {
                let names: Vec<&str> = changed.iter().map(|s| s.as_str()).collect();
                Reply::say(format!(
                    "Noted your {}. Ask me to adjust the itinerary whenever you like.",
                    names.join(", ")
                ))
            };
        }

        match self
            .assembler
            .generate(&session.collected_slots, session.currency.as_deref(), events)
            .await
        {
            Ok(plan) => {
                info!(session_id = %session.id, regenerate, "update_slots: plan generated");
                let text = plan_ready_text(&plan, regenerate);
                session.current_plan = Some(plan);
                session.plan_generated = true;
                Reply::say(text)
            }
            Err(PlannerError::Validation(msg)) => {
                warn!(session_id = %session.id, %msg, "update_slots: slots rejected");
                if regenerate {
                    session.collected_slots = previous;
                }
                Reply::ask(format!("I can't plan that yet: {msg}. Could you check the details?"))
            }
            Err(e) => {
                error!(session_id = %session.id, error = %e, "update_slots: generation failed");
                session.collected_slots = previous;
                Reply::say(failure_text(&e))
            }
        }
    }

    /// Generate a plan straight from slots, bypassing the dialogue
    pub async fn plan_direct(&self, patch: SlotPatch) -> PlannerResult<TurnOutcome> {
        let mut session = Session::new();
        debug!(session_id = %session.id, "plan_direct: called");
        let _guard = self.locks.lock(&session.id).await;
        session.collected_slots.merge(patch);
        let events = self.emitter(&session.id);
        let plan = self
            .assembler
            .generate(&session.collected_slots, session.currency.as_deref(), &events)
            .await?;
        let text = plan_ready_text(&plan, false);
        session.current_plan = Some(plan);
        session.plan_generated = true;
        session.push_turn(Role::Assistant, text.clone());
        self.store.put(session.clone()).await?;
        Ok(TurnOutcome {
            session_id: session.id,
            assistant_text: text,
            plan: session.current_plan,
            needs_more_info: false,
            complete: true,
        })
    }

    fn current_plan(session: &Session) -> PlannerResult<&Plan> {
        session
            .current_plan
            .as_ref()
            .ok_or_else(|| PlannerError::NotFound(format!("plan for session {}", session.id)))
    }

    /// Revise a session's plan directly; errors surface to the caller
    pub async fn revise(&self, session_id: &str, instruction: &str) -> PlannerResult<Revision> {
        let _guard = self.locks.lock(session_id).await;
        let mut session = self.session(session_id).await?;
        let plan = Self::current_plan(&session)?;
        let revision = self.assembler.revise(plan, instruction, &self.emitter(session_id)).await?;
        if revision.changed {
            session.current_plan = Some(revision.plan.clone());
            session.touch();
            self.store.put(session).await?;
        }
        Ok(revision)
    }

    /// Apply one timeline edit to a session's plan
    pub async fn edit(&self, session_id: &str, edit: &TimelineEdit) -> PlannerResult<Plan> {
        let _guard = self.locks.lock(session_id).await;
        debug!(%session_id, op = edit.name(), "edit: called");
        let mut session = self.session(session_id).await?;
        let mut plan = timeline::apply(Self::current_plan(&session)?, edit)?;
        self.assembler.reprice(&mut plan);
        self.emitter(session_id).plan_changed(plan.revision);
        session.current_plan = Some(plan.clone());
        session.touch();
        self.store.put(session).await?;
        Ok(plan)
    }

    /// Replace a session's plan wholesale with a validated foreign payload
    pub async fn import_plan(&self, session_id: &str, payload: &str) -> PlannerResult<Plan> {
        let _guard = self.locks.lock(session_id).await;
        let mut session = self.session(session_id).await?;
        let mut plan = Plan::from_json(payload)?;
        if let Some(current) = &session.current_plan {
            plan.revision = current.revision + 1;
            plan.slot_seq = plan.slot_seq.max(current.slot_seq);
        }
        self.assembler.reprice(&mut plan);
        session.current_plan = Some(plan.clone());
        session.plan_generated = true;
        session.touch();
        self.store.put(session).await?;
        Ok(plan)
    }

    pub async fn expire(&self, older_than: Duration) -> PlannerResult<Vec<String>> {
        let expired = self.store.expire(older_than).await?;
        info!(count = expired.len(), "expire: sessions removed");
        Ok(expired)
    }
}
