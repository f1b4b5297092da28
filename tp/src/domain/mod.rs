//! Domain types: the plan schema, dialogue slots, sessions and sharing records

pub mod clock;
pub mod id;
pub mod offers;
pub mod plan;
pub mod session;
pub mod share;
pub mod slots;

pub use clock::{ClockTime, ParseClockError};
pub use id::{generate_id, generate_token};
pub use offers::{FlightDirection, FlightOption, FlightSegment, HotelOption, WeatherDay};
pub use plan::{
    Activity, Category, Flights, Lodging, Plan, PlanError, PriceLine, Pricing, SCHEMA_VERSION, TimeSlot, Travelers,
    total_days_between,
};
pub use session::{Role, Session, SessionState, Turn};
pub use share::{
    Notification, NotificationKind, Permission, Permissions, Share, Suggestion, SuggestionStatus, Trip,
};
pub use slots::{SlotName, SlotPatch, TripRequest, TripSlots};
