//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{Notification, Session, Share, Suggestion, Trip};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    // Session operations
    GetSession {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Session>>>,
    },
    PutSession {
        session: Box<Session>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    DeleteSession {
        id: String,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    ExpireSessions {
        cutoff_ms: i64,
        reply: oneshot::Sender<StateResponse<Vec<String>>>,
    },
    ListSessions {
        reply: oneshot::Sender<StateResponse<Vec<Session>>>,
    },

    // Trip operations (live plan copies)
    GetTrip {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Trip>>>,
    },
    PutTrip {
        trip: Box<Trip>,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Share operations
    CreateShare {
        share: Box<Share>,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    GetShare {
        token: String,
        reply: oneshot::Sender<StateResponse<Option<Share>>>,
    },
    PutShare {
        share: Box<Share>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListShares {
        trip_id: String,
        reply: oneshot::Sender<StateResponse<Vec<Share>>>,
    },

    // Suggestion operations
    CreateSuggestion {
        suggestion: Box<Suggestion>,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    GetSuggestion {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Suggestion>>>,
    },
    PutSuggestion {
        suggestion: Box<Suggestion>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListSuggestions {
        trip_id: String,
        status_filter: Option<String>,
        reply: oneshot::Sender<StateResponse<Vec<Suggestion>>>,
    },

    // Notification operations
    CreateNotification {
        notification: Notification,
        reply: oneshot::Sender<StateResponse<String>>,
    },
    GetNotification {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Notification>>>,
    },
    PutNotification {
        notification: Notification,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ListNotifications {
        user_id: String,
        unread_only: bool,
        reply: oneshot::Sender<StateResponse<Vec<Notification>>>,
    },
}
