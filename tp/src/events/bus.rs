//! Event Bus - pub/sub for planning activity
//!
//! Components emit fire-and-forget events; the progress stream and the file
//! logger subscribe. Nothing in the engine waits on a subscriber.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::types::{PlanProgress, PlanStage, TripEvent};

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Progress subscription errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgressError {
    #[error("session {0} already has a progress subscriber")]
    AlreadySubscribed(String),
}

/// Central event bus for planning activity
pub struct EventBus {
    tx: broadcast::Sender<TripEvent>,
    /// Sessions with a live progress subscription
    progress_subscribers: Arc<Mutex<HashSet<String>>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            progress_subscribers: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers; dropped when nobody listens
    pub fn emit(&self, event: TripEvent) {
        debug!(
            event_type = event.event_type(),
            session_id = event.session_id(),
            "EventBus::emit"
        );
        let _ = self.tx.send(event);
    }

    /// Subscribe to every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TripEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter handle bound to a session
    pub fn emitter_for(&self, session_id: impl Into<String>) -> EventEmitter {
        let session_id = session_id.into();
        debug!(%session_id, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            session_id,
        }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Stream the stage events of one session
    ///
    /// At most one stream per session. The stream ends after a terminal
    /// stage, when `ceiling` elapses, or when the receiver is dropped,
    /// whichever comes first.
    pub fn progress_stream(
        &self,
        session_id: &str,
        ceiling: Duration,
        capacity: usize,
    ) -> Result<mpsc::Receiver<PlanProgress>, ProgressError> {
        debug!(%session_id, ?ceiling, "progress_stream: called");
        {
            let mut active = lock(&self.progress_subscribers);
            if !active.insert(session_id.to_string()) {
                return Err(ProgressError::AlreadySubscribed(session_id.to_string()));
            }
        }

        let mut rx = self.tx.subscribe();
        let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
        let session_id = session_id.to_string();
        let active = Arc::clone(&self.progress_subscribers);

        tokio::spawn(async move {
            let forward = async {
                loop {
                    let received = tokio::select! {
                        received = rx.recv() => received,
                        _ = out_tx.closed() => {
                            debug!(%session_id, "progress_stream: receiver dropped");
                            break;
                        }
                    };
                    match received {
                        Ok(TripEvent::StageReached {
                            session_id: sid,
                            stage,
                            detail,
                        }) if sid == session_id => {
                            if out_tx.send(PlanProgress { stage, detail }).await.is_err() {
                                debug!(%session_id, "progress_stream: receiver dropped");
                                break;
                            }
                            if stage.is_terminal() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(%session_id, missed = n, "progress_stream: lagged behind, missed events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            if tokio::time::timeout(ceiling, forward).await.is_err() {
                debug!(%session_id, "progress_stream: ceiling reached");
            }
            lock(&active).remove(&session_id);
        });

        Ok(out_rx)
    }
}

fn lock(set: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    // Poisoning is ignored; the set holds plain ids
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Create a shared event bus
pub fn create_event_bus(capacity: usize) -> Arc<EventBus> {
    Arc::new(EventBus::new(capacity))
}

/// Handle for components to emit events without owning the bus
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<TripEvent>,
    session_id: String,
}

impl EventEmitter {
    /// Emitter that goes nowhere, for callers without a bus
    pub fn detached(session_id: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            session_id: session_id.into(),
        }
    }

    /// Get the session ID this emitter is bound to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Emit a raw event
    pub fn emit(&self, event: TripEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn stage(&self, stage: PlanStage) {
        self.emit(TripEvent::StageReached {
            session_id: self.session_id.clone(),
            stage,
            detail: None,
        });
    }

    pub fn stage_with(&self, stage: PlanStage, detail: impl Into<String>) {
        self.emit(TripEvent::StageReached {
            session_id: self.session_id.clone(),
            stage,
            detail: Some(detail.into()),
        });
    }

    pub fn section_degraded(&self, section: &str, reason: &str) {
        self.emit(TripEvent::SectionDegraded {
            session_id: self.session_id.clone(),
            section: section.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn turn_completed(&self, needs_more_info: bool, complete: bool) {
        self.emit(TripEvent::TurnCompleted {
            session_id: self.session_id.clone(),
            needs_more_info,
            complete,
        });
    }

    pub fn plan_changed(&self, revision: u32) {
        self.emit(TripEvent::PlanChanged {
            session_id: self.session_id.clone(),
            revision,
        });
    }

    pub fn share_created(&self, token: &str, permission: &str) {
        self.emit(TripEvent::ShareCreated {
            session_id: self.session_id.clone(),
            token: token.to_string(),
            permission: permission.to_string(),
        });
    }

    pub fn suggestion_changed(&self, suggestion_id: &str, status: &str) {
        self.emit(TripEvent::SuggestionChanged {
            session_id: self.session_id.clone(),
            suggestion_id: suggestion_id.to_string(),
            status: status.to_string(),
        });
    }
}
