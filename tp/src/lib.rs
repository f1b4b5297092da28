//! TripPlanner - conversational trip planning engine
//!
//! A traveller describes a trip in free text; the engine collects the trip
//! details over several turns, fans out to flight, hotel, weather and
//! activity providers, and assembles a day-by-day itinerary that can then be
//! revised, edited slot by slot, and shared with friends who suggest
//! changes.
//!
//! # Modules
//!
//! - [`session`] - Slot-filling dialogue engine and session storage
//! - [`intent`] - Turning user text into slot updates, revisions or questions
//! - [`planner`] - Plan assembly, pacing, pricing and revision strategies
//! - [`provider`] - Gateway to flight, hotel, weather and activity data
//! - [`timeline`] - Pure, validated edits on a plan
//! - [`sharing`] - Share links, permissions and suggestions
//! - [`service`] - The boundary surface tying it all together
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod intent;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod provider;
pub mod repl;
pub mod service;
pub mod session;
pub mod sharing;
pub mod state;
pub mod timeline;

// Re-export commonly used types
pub use config::{Config, LlmConfig};
pub use domain::{
    Activity, Category, ClockTime, Permission, Plan, Session, Share, SlotPatch, Suggestion, SuggestionStatus,
    TimeSlot, TripSlots,
};
pub use error::{PlannerError, PlannerResult};
pub use events::{EventBus, EventEmitter, PlanProgress, PlanStage, TripEvent, create_event_bus, spawn_event_logger};
pub use intent::{Intent, IntentError, IntentParser, create_parser};
pub use llm::{LlmClient, LlmError, OpenAIClient, create_client};
pub use planner::{PlanAssembler, Revision, Reviser};
pub use provider::{ProviderError, ProviderGateway, create_gateway};
pub use service::TripService;
pub use session::{MemorySessionStore, SessionEngine, SessionStore, TurnOutcome};
pub use sharing::{Access, ReviewAction, SharedView, SharingCoordinator};
pub use state::{StateError, StateManager};
pub use timeline::{TimelineEdit, TimelineError};
