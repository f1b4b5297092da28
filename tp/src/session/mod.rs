//! Conversation sessions: storage, per-session serialization and the turn engine

mod engine;
mod locks;
mod store;

pub use engine::{SessionEngine, TurnOutcome};
pub use locks::KeyedLocks;
pub use store::{MemorySessionStore, SessionStore};
