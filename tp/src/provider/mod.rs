//! ProviderGateway - uniform adapter to external travel data
//!
//! Five calls, all fallible and all allowed to come back empty. Deadlines are
//! enforced by the caller per call, so implementations only need to answer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ProviderKind, ProvidersConfig};
use crate::domain::{Activity, ClockTime, FlightOption, HotelOption, TimeSlot, Travelers, WeatherDay};

mod http;
mod template;

pub use http::HttpGateway;
pub use template::TemplateGateway;

/// Provider call failures
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{call} timed out after {after:?}")]
    Timeout {
        call: &'static str,
        after: std::time::Duration,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("undecodable provider answer: {0}")]
    Decode(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightQuery {
    pub origin: String,
    pub destination: String,
    pub depart_on: NaiveDate,
    /// Return date; inbound options are only searched when present
    pub return_on: Option<NaiveDate>,
    pub travelers: Travelers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelQuery {
    pub destination: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub travelers: Travelers,
    #[serde(default)]
    pub budget: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastQuery {
    pub destination: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// How full a day should be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pacing {
    Light,
    Balanced,
    Busy,
}

/// Shaping hints for one day of the itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayHint {
    pub day: u32,
    pub date: NaiveDate,
    pub pacing: Pacing,
    /// Nothing may start before this (arrival day)
    #[serde(default)]
    pub earliest_start: Option<ClockTime>,
    /// Nothing may end after this (departure day)
    #[serde(default)]
    pub latest_end: Option<ClockTime>,
    /// Rain expected; prefer indoor options
    #[serde(default)]
    pub wet: bool,
}

/// Everything the activity planner gets to see
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityContext {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travelers: Travelers,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub budget: Option<String>,
    /// Neighbourhood of the chosen lodging
    #[serde(default)]
    pub lodging_area: Option<String>,
    #[serde(default)]
    pub arrival: Option<ClockTime>,
    #[serde(default)]
    pub departure: Option<ClockTime>,
    #[serde(default)]
    pub weather: Vec<WeatherDay>,
    pub days: Vec<DayHint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativesQuery {
    pub day: u32,
    pub start: ClockTime,
    pub end: ClockTime,
    pub destination: String,
    #[serde(default)]
    pub preferences: Vec<String>,
    #[serde(default)]
    pub exclude_ids: Vec<String>,
    /// Prefer options near this area
    #[serde(default)]
    pub near: Option<String>,
}

/// External travel data sources
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<FlightOption>, ProviderError>;

    async fn search_hotels(&self, query: &HotelQuery) -> Result<Vec<HotelOption>, ProviderError>;

    async fn forecast(&self, query: &ForecastQuery) -> Result<Vec<WeatherDay>, ProviderError>;

    /// Day-by-day slots; ids are reassigned by the caller
    async fn plan_activities(&self, context: &ActivityContext) -> Result<Vec<TimeSlot>, ProviderError>;

    async fn alternatives(&self, query: &AlternativesQuery) -> Result<Vec<Activity>, ProviderError>;
}

/// Build the configured gateway
pub fn create_gateway(config: &ProvidersConfig) -> Result<Arc<dyn ProviderGateway>, ProviderError> {
    debug!(kind = ?config.kind, "create_gateway: called");
    match config.kind {
        ProviderKind::Template => Ok(Arc::new(TemplateGateway::new())),
        ProviderKind::Http => Ok(Arc::new(HttpGateway::new(&config.base_url)?)),
    }
}

#[cfg(test)]
pub mod mock {
    //! Scriptable gateway for unit tests

    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Behaviour of one mocked call
    #[derive(Clone)]
    pub enum Behaviour<T> {
        Return(T),
        Fail,
        Hang,
    }

    impl<T: Clone> Behaviour<T> {
        async fn run(&self, call: &'static str) -> Result<T, ProviderError> {
            match self {
                Behaviour::Return(value) => Ok(value.clone()),
                Behaviour::Fail => Err(ProviderError::Unavailable(format!("{call} is down"))),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(ProviderError::Unavailable(format!("{call} hung")))
                }
            }
        }
    }

    /// Gateway whose answers are set per call; activities fall back to templates
    pub struct MockGateway {
        pub flights: Behaviour<Vec<FlightOption>>,
        pub hotels: Behaviour<Vec<HotelOption>>,
        pub weather: Behaviour<Vec<WeatherDay>>,
        /// `None` delegates to the template gateway
        pub activities: Option<Behaviour<Vec<TimeSlot>>>,
        pub alternatives: Option<Behaviour<Vec<Activity>>>,
        pub calls: AtomicUsize,
        pub last_context: Mutex<Option<ActivityContext>>,
        pub hotel_queries: AtomicUsize,
        pub(crate) templates: TemplateGateway,
    }

    impl Default for MockGateway {
        fn default() -> Self {
            Self {
                flights: Behaviour::Return(vec![]),
                hotels: Behaviour::Return(vec![]),
                weather: Behaviour::Return(vec![]),
                activities: None,
                alternatives: None,
                calls: AtomicUsize::new(0),
                last_context: Mutex::new(None),
                hotel_queries: AtomicUsize::new(0),
                templates: TemplateGateway::new(),
            }
        }
    }

    impl MockGateway {
        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderGateway for MockGateway {
        async fn search_flights(&self, _query: &FlightQuery) -> Result<Vec<FlightOption>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.flights.run("flights").await
        }

        async fn search_hotels(&self, _query: &HotelQuery) -> Result<Vec<HotelOption>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.hotel_queries.fetch_add(1, Ordering::SeqCst);
            self.hotels.run("hotels").await
        }

        async fn forecast(&self, _query: &ForecastQuery) -> Result<Vec<WeatherDay>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.weather.run("weather").await
        }

        async fn plan_activities(&self, context: &ActivityContext) -> Result<Vec<TimeSlot>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_context.lock().unwrap() = Some(context.clone());
            match &self.activities {
                Some(behaviour) => behaviour.run("activities").await,
                None => self.templates.plan_activities(context).await,
            }
        }

        async fn alternatives(&self, query: &AlternativesQuery) -> Result<Vec<Activity>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.alternatives {
                Some(behaviour) => behaviour.run("alternatives").await,
                None => self.templates.alternatives(query).await,
            }
        }
    }
}
