//! State management with actor pattern
//!
//! StateManager owns the TripStore and processes messages via channels,
//! providing thread-safe access to sessions, trips, shares, suggestions
//! and notifications.

mod manager;
mod messages;

pub use manager::StateManager;
pub use messages::{StateCommand, StateError, StateResponse};
