//! Plan generation and revision orchestration

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::pacing::{self, Logistics};
use super::pricing;
use super::revise::{Revision, RevisionContext, Reviser};
use super::with_deadline;
use crate::config::{PlanningConfig, ProviderTimeouts};
use crate::domain::{
    Activity, FlightDirection, FlightOption, HotelOption, Plan, TripRequest, TripSlots, WeatherDay,
};
use crate::error::{PlannerError, PlannerResult};
use crate::events::{EventEmitter, PlanStage};
use crate::provider::{
    ActivityContext, AlternativesQuery, FlightQuery, ForecastQuery, HotelQuery, ProviderError, ProviderGateway,
};

/// Builds and revises plans against a provider gateway
pub struct PlanAssembler {
    gateway: Arc<dyn ProviderGateway>,
    reviser: Arc<dyn Reviser>,
    planning: PlanningConfig,
    timeouts: ProviderTimeouts,
}

/// Result of one provider section
enum Section<T> {
    Ready(T),
    Degraded,
}

impl<T: Default> Section<T> {
    fn into_value(self) -> T {
        match self {
            Section::Ready(value) => value,
            Section::Degraded => T::default(),
        }
    }

    fn failed(&self) -> bool {
        matches!(self, Section::Degraded)
    }
}

fn cheapest(options: &[FlightOption], direction: FlightDirection) -> Option<FlightOption> {
    options
        .iter()
        .filter(|f| f.direction == direction && !f.segments.is_empty())
        .min_by(|a, b| a.price.total_cmp(&b.price))
        .cloned()
}

/// Best rated, cheaper on ties; cheapest outright when a budget was given
fn choose_hotel(options: &[HotelOption], budget: Option<&str>) -> Option<HotelOption> {
    let best = if budget.is_some() {
        options.iter().min_by(|a, b| a.price_total.total_cmp(&b.price_total))
    } else {
        options.iter().max_by(|a, b| {
            a.rating
                .unwrap_or(0.0)
                .total_cmp(&b.rating.unwrap_or(0.0))
                .then(b.price_total.total_cmp(&a.price_total))
        })
    };
    best.cloned()
}

impl PlanAssembler {
    pub fn new(
        gateway: Arc<dyn ProviderGateway>,
        reviser: Arc<dyn Reviser>,
        planning: PlanningConfig,
        timeouts: ProviderTimeouts,
    ) -> Self {
        Self {
            gateway,
            reviser,
            planning,
            timeouts,
        }
    }

    pub fn planning(&self) -> &PlanningConfig {
        &self.planning
    }

    /// Recompute pricing after an edit outside the assembler
    pub fn reprice(&self, plan: &mut Plan) {
        pricing::recompute(plan, self.planning.daily_transport_estimate);
    }

    fn degrade<T>(
        &self,
        section: &'static str,
        result: Result<T, ProviderError>,
        warnings: &mut Vec<String>,
        events: &EventEmitter,
    ) -> Section<T> {
        match result {
            Ok(value) => Section::Ready(value),
            Err(e) => {
                warn!(section, error = %e, "degrade: provider section failed");
                events.section_degraded(section, &e.to_string());
                warnings.push(format!("{section} unavailable: {e}"));
                Section::Degraded
            }
        }
    }

    /// Build a plan from collected dialogue slots
    pub async fn generate(&self, slots: &TripSlots, currency: Option<&str>, events: &EventEmitter) -> PlannerResult<Plan> {
        let request = slots.to_request().map_err(PlannerError::Validation)?;
        self.generate_request(&request, currency, events).await
    }

    /// Build a plan from a complete request
    pub async fn generate_request(
        &self,
        request: &TripRequest,
        currency: Option<&str>,
        events: &EventEmitter,
    ) -> PlannerResult<Plan> {
        debug!(origin = %request.origin, destination = %request.destination, "generate_request: called");
        events.stage(PlanStage::Planning);
        let result = self.assemble(request, currency, events).await;
        match &result {
            Ok(plan) => {
                events.stage_with(PlanStage::Complete, format!("{} time slots", plan.time_slots.len()));
                info!(destination = %plan.destination, days = plan.total_days, "generate_request: plan ready");
            }
            Err(e) => events.stage_with(PlanStage::Failed, e.to_string()),
        }
        result
    }

    async fn assemble(&self, request: &TripRequest, currency: Option<&str>, events: &EventEmitter) -> PlannerResult<Plan> {
        if request.end_date < request.start_date {
            return Err(PlannerError::Validation("end date is before start date".to_string()));
        }
        if request.travelers.total() == 0 {
            return Err(PlannerError::Validation("at least one traveler is required".to_string()));
        }
        let currency = currency.unwrap_or(&self.planning.currency);
        let mut plan = Plan::skeleton(
            &request.origin,
            &request.destination,
            request.start_date,
            request.end_date,
            request.travelers,
            currency,
        );

        let flight_query = FlightQuery {
            origin: request.origin.clone(),
            destination: request.destination.clone(),
            depart_on: request.start_date,
            return_on: Some(request.end_date),
            travelers: request.travelers,
        };
        let hotel_query = HotelQuery {
            destination: request.destination.clone(),
            check_in: request.start_date,
            check_out: request.end_date,
            travelers: request.travelers,
            budget: request.budget.clone(),
        };
        let forecast_query = ForecastQuery {
            destination: request.destination.clone(),
            start: request.start_date,
            end: request.end_date,
        };

        let flights = async {
            let r = with_deadline("flights", self.timeouts.flights, self.gateway.search_flights(&flight_query)).await;
            events.stage(PlanStage::Flights);
            r
        };
        let hotels = async {
            let r = with_deadline("hotels", self.timeouts.hotels, self.gateway.search_hotels(&hotel_query)).await;
            events.stage(PlanStage::Hotels);
            r
        };
        let weather = async {
            let r = with_deadline("weather", self.timeouts.weather, self.gateway.forecast(&forecast_query)).await;
            events.stage(PlanStage::Weather);
            r
        };
        let (flights, hotels, weather) = tokio::join!(flights, hotels, weather);

        let mut warnings = Vec::new();
        let flights: Section<Vec<FlightOption>> = self.degrade("flights", flights, &mut warnings, events);
        let hotels: Section<Vec<HotelOption>> = self.degrade("hotels", hotels, &mut warnings, events);
        let weather: Section<Vec<WeatherDay>> = self.degrade("weather", weather, &mut warnings, events);
        let logistics_failed = [flights.failed(), hotels.failed(), weather.failed()];

        let flight_options = flights.into_value();
        plan.flights.outbound = cheapest(&flight_options, FlightDirection::Outbound);
        plan.flights.inbound = cheapest(&flight_options, FlightDirection::Inbound);
        plan.lodging.selected = choose_hotel(&hotels.into_value(), request.budget.as_deref());
        plan.weather = weather.into_value();

        let hints = pacing::day_hints(
            &Logistics {
                start_date: plan.start_date,
                end_date: plan.end_date,
                total_days: plan.total_days,
                outbound: plan.flights.outbound.as_ref(),
                inbound: plan.flights.inbound.as_ref(),
                weather: &plan.weather,
                preferences: &request.preferences,
            },
            &self.planning,
        );
        let context = ActivityContext {
            destination: request.destination.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            travelers: request.travelers,
            preferences: request.preferences.clone(),
            budget: request.budget.clone(),
            lodging_area: plan.lodging.selected.as_ref().and_then(|h| h.neighborhood.clone()),
            arrival: hints.first().and_then(|h| h.earliest_start),
            departure: hints.last().and_then(|h| h.latest_end),
            weather: plan.weather.clone(),
            days: hints.clone(),
        };
        let activities = with_deadline(
            "activities",
            self.timeouts.activities,
            self.gateway.plan_activities(&context),
        )
        .await;
        events.stage(PlanStage::Itinerary);
        let activities: Section<Vec<_>> = self.degrade("activities", activities, &mut warnings, events);

        if logistics_failed.iter().all(|f| *f) && activities.failed() {
            return Err(PlannerError::Provider(warnings.join("; ")));
        }

        events.stage(PlanStage::Formatting);
        let dropped = pacing::shape(&mut plan, activities.into_value(), &hints);
        if dropped > 0 {
            debug!(dropped, "assemble: provider slots did not fit the days");
        }
        pacing::adapt_for_weather(&mut plan, self.planning.rain_threshold);
        if plan.flights.outbound.is_none() && !logistics_failed[0] {
            warnings.push("no flight options found".to_string());
        }
        if plan.lodging.selected.is_none() && !logistics_failed[1] {
            warnings.push("no lodging options found".to_string());
        }
        plan.warnings = warnings;
        plan.summary = summarize(&plan);
        self.reprice(&mut plan);
        plan.validate()?;
        Ok(plan)
    }

    /// Apply a revision instruction; the prior plan is left untouched on failure
    pub async fn revise(&self, plan: &Plan, instruction: &str, events: &EventEmitter) -> PlannerResult<Revision> {
        debug!(%instruction, revision = plan.revision, "revise: called");
        events.stage(PlanStage::Revising);
        let ctx = RevisionContext {
            gateway: self.gateway.as_ref(),
            timeouts: &self.timeouts,
            planning: &self.planning,
        };
        let result = self.reviser.revise(plan, instruction, &ctx).await.and_then(|mut revision| {
            if revision.changed {
                let plan = &mut revision.plan;
                plan.sort_slots();
                plan.summary = summarize(plan);
                pricing::recompute(plan, self.planning.daily_transport_estimate);
                plan.revision += 1;
                plan.validate()?;
            }
            Ok(revision)
        });
        match &result {
            Ok(revision) => {
                events.stage_with(PlanStage::Complete, revision.summary.clone());
                if revision.changed {
                    events.plan_changed(revision.plan.revision);
                }
            }
            Err(e) => events.stage_with(PlanStage::Failed, e.to_string()),
        }
        result
    }

    /// Fresh options for one slot, excluding everything already in it
    pub async fn alternatives(&self, plan: &Plan, slot_id: &str, preferences: &[String]) -> PlannerResult<Vec<Activity>> {
        debug!(%slot_id, "alternatives: called");
        let slot = plan
            .slot(slot_id)
            .ok_or_else(|| PlannerError::NotFound(format!("time slot {slot_id}")))?;
        let query = AlternativesQuery {
            day: slot.day,
            start: slot.start_time,
            end: slot.end_time,
            destination: plan.destination.clone(),
            preferences: preferences.to_vec(),
            exclude_ids: slot.options.iter().map(|a| a.id.clone()).collect(),
            near: plan.lodging.selected.as_ref().and_then(|h| h.neighborhood.clone()),
        };
        with_deadline(
            "alternatives",
            self.timeouts.alternatives,
            self.gateway.alternatives(&query),
        )
        .await
        .map_err(|e| PlannerError::Provider(e.to_string()))
    }
}

fn summarize(plan: &Plan) -> String {
    let activities = plan.time_slots.iter().filter(|s| !s.is_meal()).count();
    let meals = plan.time_slots.len() - activities;
    let mut summary = format!(
        "{} day{} in {} from {} ({} to {}): {} activities and {} meals",
        plan.total_days,
        if plan.total_days == 1 { "" } else { "s" },
        plan.destination,
        plan.origin,
        plan.start_date,
        plan.end_date,
        activities,
        meals
    );
    if let Some(hotel) = &plan.lodging.selected {
        summary.push_str(&format!(", staying at {}", hotel.name));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FlightSegment;
    use crate::events::EventBus;
    use crate::planner::HeuristicReviser;
    use crate::provider::mock::{Behaviour, MockGateway};
    use chrono::{NaiveDate, NaiveDateTime};
    use std::time::Duration;

    fn slots() -> TripSlots {
        TripSlots {
            origin: Some("Istanbul".into()),
            destination: Some("Berlin".into()),
            start_date: NaiveDate::from_ymd_opt(2025, 11, 20),
            end_date: NaiveDate::from_ymd_opt(2025, 11, 23),
            adults: Some(2),
            ..Default::default()
        }
    }

    fn assembler(gateway: MockGateway) -> (PlanAssembler, Arc<MockGateway>) {
        let gateway = Arc::new(gateway);
        let timeouts = ProviderTimeouts {
            flights: Duration::from_secs(5),
            hotels: Duration::from_secs(5),
            weather: Duration::from_secs(5),
            activities: Duration::from_secs(5),
            alternatives: Duration::from_secs(5),
        };
        let assembler = PlanAssembler::new(
            gateway.clone(),
            Arc::new(HeuristicReviser::new().unwrap()),
            PlanningConfig::default(),
            timeouts,
        );
        (assembler, gateway)
    }

    fn flight(direction: FlightDirection, depart: &str, arrive: &str, price: f64) -> FlightOption {
        let at = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap();
        FlightOption {
            provider: "air".into(),
            direction,
            price,
            currency: "EUR".into(),
            segments: vec![FlightSegment {
                from: "IST".into(),
                to: "BER".into(),
                departure: at(depart),
                arrival: at(arrive),
                carrier: "XX".into(),
                flight_number: "100".into(),
            }],
            booking_url: None,
        }
    }

    #[tokio::test]
    async fn test_generate_with_templates() {
        let (assembler, _) = assembler(MockGateway::default());
        let plan = assembler
            .generate(&slots(), None, &EventEmitter::detached("s"))
            .await
            .unwrap();
        assert_eq!(plan.total_days, 3);
        assert!(!plan.time_slots.is_empty());
        plan.validate().unwrap();
        assert!(plan.time_slots.iter().all(|s| s.options.len() == 4));
        assert!(plan.pricing.total_estimated > 0.0);
        assert!(plan.warnings.iter().any(|w| w.contains("no flight")));
    }

    #[tokio::test]
    async fn test_missing_slot_is_validation_error() {
        let (assembler, gateway) = assembler(MockGateway::default());
        let mut incomplete = slots();
        incomplete.adults = None;
        let err = assembler
            .generate(&incomplete, None, &EventEmitter::detached("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Validation(_)));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test]
    async fn test_flights_anchor_first_and_last_day() {
        let (assembler, gateway) = assembler(MockGateway {
            flights: Behaviour::Return(vec![
                flight(FlightDirection::Outbound, "2025-11-20 06:00", "2025-11-20 08:30", 180.0),
                flight(FlightDirection::Outbound, "2025-11-20 09:00", "2025-11-20 11:30", 150.0),
                flight(FlightDirection::Inbound, "2025-11-22 20:00", "2025-11-22 23:30", 160.0),
            ]),
            ..Default::default()
        });
        let plan = assembler
            .generate(&slots(), None, &EventEmitter::detached("s"))
            .await
            .unwrap();

        assert_eq!(plan.flights.outbound.as_ref().unwrap().price, 150.0);
        let context = gateway.last_context.lock().unwrap().clone().unwrap();
        assert_eq!(context.days[0].earliest_start.unwrap().to_string(), "13:00");
        assert_eq!(context.days[2].latest_end.unwrap().to_string(), "17:00");
        assert!(plan.slots_on_day(1).all(|s| s.start_time.to_string().as_str() >= "13:00"));
        assert!(plan.slots_on_day(3).all(|s| s.end_time.to_string().as_str() <= "17:00"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_sections_degrade() {
        let (assembler, _) = assembler(MockGateway {
            flights: Behaviour::Hang,
            hotels: Behaviour::Fail,
            weather: Behaviour::Hang,
            ..Default::default()
        });
        let plan = assembler
            .generate(&slots(), None, &EventEmitter::detached("s"))
            .await
            .unwrap();
        assert!(plan.flights.outbound.is_none());
        assert!(plan.lodging.selected.is_none());
        assert!(!plan.time_slots.is_empty());
        assert_eq!(plan.warnings.len(), 3);
        assert!(plan.warnings.iter().any(|w| w.contains("timed out")));
    }

    #[tokio::test]
    async fn test_all_sections_failing_is_provider_error() {
        let (assembler, _) = assembler(MockGateway {
            flights: Behaviour::Fail,
            hotels: Behaviour::Fail,
            weather: Behaviour::Fail,
            activities: Some(Behaviour::Fail),
            ..Default::default()
        });
        let err = assembler
            .generate(&slots(), None, &EventEmitter::detached("s"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlannerError::Provider(_)));
    }

    #[tokio::test]
    async fn test_stage_events_in_order() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let (assembler, _) = assembler(MockGateway::default());
        assembler.generate(&slots(), None, &bus.emitter_for("sess-1")).await.unwrap();

        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let crate::events::TripEvent::StageReached { stage, .. } = event {
                stages.push(stage);
            }
        }
        assert_eq!(stages.first(), Some(&PlanStage::Planning));
        assert_eq!(stages.last(), Some(&PlanStage::Complete));
        for stage in [PlanStage::Flights, PlanStage::Hotels, PlanStage::Weather] {
            assert!(stages.contains(&stage));
        }
        let itinerary = stages.iter().position(|s| *s == PlanStage::Itinerary).unwrap();
        assert!(stages[..itinerary].contains(&PlanStage::Weather));
    }

    #[tokio::test]
    async fn test_noop_revision_keeps_invariants() {
        let (assembler, _) = assembler(MockGateway::default());
        let events = EventEmitter::detached("s");
        let plan = assembler.generate(&slots(), None, &events).await.unwrap();
        let revision = assembler.revise(&plan, "no changes", &events).await.unwrap();
        assert!(!revision.changed);
        revision.plan.validate().unwrap();
        assert_eq!(revision.plan.revision, plan.revision);
    }

    #[tokio::test]
    async fn test_revision_stages() {
        let bus = EventBus::new(64);
        let (assembler, _) = assembler(MockGateway::default());
        let events = bus.emitter_for("sess-r");
        let plan = assembler.generate(&slots(), None, &events).await.unwrap();

        let mut rx = bus.subscribe();
        assembler.revise(&plan, "no changes", &events).await.unwrap();
        let mut stages = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let crate::events::TripEvent::StageReached { stage, .. } = event {
                stages.push(stage);
            }
        }
        assert_eq!(stages, vec![PlanStage::Revising, PlanStage::Complete]);
    }

    #[tokio::test]
    async fn test_revision_bumps_and_reprices() {
        let (assembler, _) = assembler(MockGateway::default());
        let events = EventEmitter::detached("s");
        let plan = assembler.generate(&slots(), None, &events).await.unwrap();
        // Template days fill morning and afternoon, so the evening window is used
        let revision = assembler.revise(&plan, "make day 2 busier", &events).await.unwrap();
        assert!(revision.changed);
        assert_eq!(revision.plan.revision, plan.revision + 1);
        assert!(revision.plan.pricing.total_estimated > plan.pricing.total_estimated);
        revision.plan.validate().unwrap();
    }

    #[tokio::test]
    async fn test_alternatives_exclude_current_options() {
        let (assembler, _) = assembler(MockGateway::default());
        let events = EventEmitter::detached("s");
        let plan = assembler.generate(&slots(), None, &events).await.unwrap();
        let slot = &plan.time_slots[0];
        let options = assembler.alternatives(&plan, &slot.id, &[]).await.unwrap();
        assert!(!options.is_empty());
        assert!(options.iter().all(|a| slot.options.iter().all(|o| o.id != a.id)));

        let err = assembler.alternatives(&plan, "d9-0000-99", &[]).await.unwrap_err();
        assert!(matches!(err, PlannerError::NotFound(_)));
    }

    #[test]
    fn test_choose_hotel() {
        let hotel = |name: &str, price: f64, rating: f32| HotelOption {
            provider: "h".into(),
            name: name.into(),
            neighborhood: None,
            check_in: NaiveDate::from_ymd_opt(2025, 11, 20).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2025, 11, 23).unwrap(),
            price_total: price,
            rating: Some(rating),
            booking_url: None,
        };
        let offers = vec![hotel("A", 500.0, 4.5), hotel("B", 300.0, 4.5), hotel("C", 200.0, 3.0)];
        assert_eq!(choose_hotel(&offers, None).unwrap().name, "B");
        assert_eq!(choose_hotel(&offers, Some("cheap")).unwrap().name, "C");
    }
}
