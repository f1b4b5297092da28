//! Planning events and progress streaming
//!
//! Every plan build emits stage events (`parsing → planning → flights →
//! hotels → weather → itinerary → formatting → complete`) onto a broadcast
//! bus keyed by session id. A transport adapter can turn them into a
//! per-session stream with [`EventBus::progress_stream`]; the file logger
//! keeps a JSONL history. Correctness never depends on anyone listening.

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter, ProgressError, create_event_bus};
pub use logger::{EventLogger, read_session_events, spawn_event_logger};
pub use types::{EventLogEntry, PlanProgress, PlanStage, TripEvent};
