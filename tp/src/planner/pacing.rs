//! Day shaping: pacing hints, arrival/departure bounds, weather ordering

use chrono::NaiveDate;
use tracing::debug;

use crate::config::PlanningConfig;
use crate::domain::{ClockTime, FlightOption, Plan, TimeSlot, WeatherDay};
use crate::provider::{DayHint, Pacing};

/// First activity on day 1 when the arrival time is unknown
const DEFAULT_FIRST_DAY_START: ClockTime = ClockTime::from_minutes(13 * 60);

/// Hours after checkout the last day may run when no return flight is known
const CHECKOUT_GRACE_MINUTES: u16 = 3 * 60;

/// Earliest end for the eve of a next-morning departure
const DEPARTURE_EVE_MIN_END: ClockTime = ClockTime::from_minutes(13 * 60);

/// Non-meal slots a light day keeps
pub const LIGHT_DAY_ACTIVITY_QUOTA: usize = 1;

/// What the day hints are derived from
pub struct Logistics<'a> {
    pub start_date: NaiveDate,
    /// Checkout date; the day after the last plan day unless the trip is a day trip
    pub end_date: NaiveDate,
    pub total_days: u32,
    pub outbound: Option<&'a FlightOption>,
    pub inbound: Option<&'a FlightOption>,
    pub weather: &'a [WeatherDay],
    pub preferences: &'a [String],
}

impl<'a> Logistics<'a> {
    /// Logistics already recorded on a plan
    pub fn of_plan(plan: &'a Plan, preferences: &'a [String]) -> Self {
        Self {
            start_date: plan.start_date,
            end_date: plan.end_date,
            total_days: plan.total_days,
            outbound: plan.flights.outbound.as_ref(),
            inbound: plan.flights.inbound.as_ref(),
            weather: &plan.weather,
            preferences,
        }
    }

    fn date_of(&self, day: u32) -> NaiveDate {
        self.start_date
            .checked_add_days(chrono::Days::new(u64::from(day - 1)))
            .unwrap_or(self.start_date)
    }
}

fn wants_nightlife(preferences: &[String]) -> bool {
    preferences
        .iter()
        .any(|p| crate::domain::Category::from_keyword(p) == Some(crate::domain::Category::Nightlife))
}

/// One hint per day: light first day, balanced middle, bounded ends
pub fn day_hints(logistics: &Logistics<'_>, config: &PlanningConfig) -> Vec<DayHint> {
    debug!(total_days = logistics.total_days, "day_hints: called");
    let last = logistics.total_days;
    (1..=last)
        .map(|day| {
            let date = logistics.date_of(day);
            let pacing = if day == 1 {
                Pacing::Light
            } else if day < last && wants_nightlife(logistics.preferences) {
                Pacing::Busy
            } else {
                Pacing::Balanced
            };

            let earliest_start = (day == 1).then(|| {
                match logistics.outbound.and_then(|f| f.arrival_time_on(date)) {
                    Some(arrival) => arrival.plus_minutes(config.arrival_buffer_minutes),
                    None => DEFAULT_FIRST_DAY_START,
                }
            });

            let latest_end = if day == last { last_day_end(logistics, date, config) } else { None };

            let wet = logistics
                .weather
                .iter()
                .find(|w| w.date == date)
                .is_some_and(|w| w.is_wet(config.rain_threshold));

            DayHint {
                day,
                date,
                pacing,
                earliest_start,
                latest_end,
                wet,
            }
        })
        .collect()
}

/// Bound on the last plan day
///
/// A return flight that day ends it at departure minus the buffer. A flight
/// the next day (the checkout date) bounds it at the same clock time, but
/// never before [`DEPARTURE_EVE_MIN_END`]. Without a flight only a plan day
/// that is itself the checkout date is capped, at checkout plus grace.
fn last_day_end(logistics: &Logistics<'_>, date: NaiveDate, config: &PlanningConfig) -> Option<ClockTime> {
    let departs = logistics.inbound.and_then(|f| f.departs_at());
    match departs {
        Some(at) if at.date() == date => logistics
            .inbound
            .and_then(|f| f.departure_time_on(date))
            .map(|t| t.minus_minutes(config.departure_buffer_minutes)),
        Some(at) if date.succ_opt() == Some(at.date()) => logistics
            .inbound
            .and_then(|f| f.departure_time_on(at.date()))
            .map(|t| t.minus_minutes(config.departure_buffer_minutes).max(DEPARTURE_EVE_MIN_END)),
        Some(_) => None,
        None if logistics.end_date == date => Some(config.checkout_time.plus_minutes(CHECKOUT_GRACE_MINUTES)),
        None => None,
    }
}

/// Day hints rebuilt from what a plan already carries
pub fn plan_hints(plan: &Plan, config: &PlanningConfig) -> Vec<DayHint> {
    day_hints(&Logistics::of_plan(plan, &[]), config)
}

/// Whether a window fits the bounds of its day
pub fn fits(hints: &[DayHint], day: u32, start: ClockTime, end: ClockTime) -> bool {
    match hints.iter().find(|h| h.day == day) {
        Some(hint) => hint.earliest_start.is_none_or(|at| start >= at) && hint.latest_end.is_none_or(|at| end <= at),
        None => true,
    }
}

/// Fit provider slots into the plan
///
/// Drops slots outside the trip, outside the day's bounds, with an empty or
/// inverted window, or overlapping an earlier slot. Survivors are sorted and
/// get fresh ids from the plan's sequence.
pub fn shape(plan: &mut Plan, raw: Vec<TimeSlot>, hints: &[DayHint]) -> usize {
    debug!(raw = raw.len(), "shape: called");
    let total = raw.len();
    let mut kept: Vec<TimeSlot> = raw
        .into_iter()
        .filter(|s| s.day >= 1 && s.day <= plan.total_days)
        .filter(|s| s.start_time < s.end_time && !s.options.is_empty())
        .filter(|s| fits(hints, s.day, s.start_time, s.end_time))
        .collect();
    kept.sort_by(|a, b| (a.day, a.start_time).cmp(&(b.day, b.start_time)));

    let mut shaped: Vec<TimeSlot> = Vec::with_capacity(kept.len());
    for mut slot in kept {
        if let Some(prev) = shaped.last()
            && prev.day == slot.day
            && prev.end_time > slot.start_time
        {
            continue;
        }
        if slot.selected.is_some_and(|i| i >= slot.options.len()) {
            slot.selected = None;
        }
        slot.id = plan.next_slot_id(slot.day, slot.start_time);
        shaped.push(slot);
    }
    let dropped = total - shaped.len();
    if dropped > 0 {
        debug!(dropped, "shape: dropped slots that did not fit");
    }
    plan.time_slots.extend(shaped);
    plan.sort_slots();
    dropped
}

/// Move indoor options first on wet days, unless the user already chose
pub fn adapt_for_weather(plan: &mut Plan, threshold: f32) {
    let wet_days: Vec<u32> = (1..=plan.total_days)
        .filter(|day| plan.weather_for_day(*day).is_some_and(|w| w.is_wet(threshold)))
        .collect();
    debug!(?wet_days, "adapt_for_weather: called");
    for slot in plan.time_slots.iter_mut().filter(|s| wet_days.contains(&s.day)) {
        indoor_first(slot);
    }
}

/// Indoor options first, unless the user already chose
pub fn indoor_first(slot: &mut TimeSlot) {
    if slot.selected.is_none() {
        slot.options.sort_by_key(|a| !a.is_indoor());
    }
}
