//! Plan - the versioned itinerary schema
//!
//! A plan is a closed, typed document. Foreign payloads (LLM output, stored
//! JSON from older builds) only enter through [`Plan::from_json`], which
//! upgrades known older versions and rejects anything that fails
//! [`Plan::validate`].

use std::collections::HashSet;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::clock::ClockTime;
use super::offers::{FlightOption, HotelOption, WeatherDay};

/// Current plan schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Errors for plans that do not satisfy the schema
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("plan invariant violated: {0}")]
    Invalid(String),

    #[error("unsupported plan schema version {0}")]
    UnsupportedVersion(u64),

    #[error("malformed plan payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Activity categories; unknown categories from providers collapse to `Other`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Breakfast,
    Lunch,
    Dinner,
    Sightseeing,
    Culture,
    Activity,
    Shopping,
    Nature,
    Nightlife,
    Relaxation,
    #[serde(other)]
    Other,
}

impl Category {
    pub fn is_meal(&self) -> bool {
        matches!(self, Self::Breakfast | Self::Lunch | Self::Dinner)
    }

    /// Categories that work regardless of weather
    pub fn is_indoor(&self) -> bool {
        matches!(
            self,
            Self::Breakfast | Self::Lunch | Self::Dinner | Self::Culture | Self::Shopping | Self::Relaxation | Self::Nightlife
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Sightseeing => "sightseeing",
            Self::Culture => "culture",
            Self::Activity => "activity",
            Self::Shopping => "shopping",
            Self::Nature => "nature",
            Self::Nightlife => "nightlife",
            Self::Relaxation => "relaxation",
            Self::Other => "other",
        }
    }

    /// Loose keyword match used by revision instructions ("more museums")
    pub fn from_keyword(word: &str) -> Option<Self> {
        let w = word.trim().to_lowercase();
        let cat = match w.trim_end_matches('s') {
            "breakfast" | "brunch" => Self::Breakfast,
            "lunch" => Self::Lunch,
            "dinner" | "restaurant" | "food" => Self::Dinner,
            "sight" | "sightseeing" | "landmark" => Self::Sightseeing,
            "culture" | "museum" | "art" | "gallery" | "gallerie" | "history" => Self::Culture,
            "activity" | "activitie" | "adventure" | "sport" => Self::Activity,
            "shopping" | "shop" | "market" => Self::Shopping,
            "nature" | "park" | "hike" | "hiking" | "outdoor" => Self::Nature,
            "nightlife" | "bar" | "club" => Self::Nightlife,
            "relaxation" | "spa" | "relax" => Self::Relaxation,
            _ => return None,
        };
        Some(cat)
    }
}

/// A single bookable or visitable thing; replaced wholesale, never patched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
}

impl Activity {
    pub fn is_meal(&self) -> bool {
        self.category.is_some_and(|c| c.is_meal())
    }

    pub fn is_indoor(&self) -> bool {
        self.category.is_some_and(|c| c.is_indoor())
    }
}

/// A window on one day holding ranked alternatives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: String,
    pub day: u32,
    #[serde(rename = "startTime")]
    pub start_time: ClockTime,
    #[serde(rename = "endTime")]
    pub end_time: ClockTime,
    pub options: Vec<Activity>,
    /// Index into `options`; unset means the first option
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<usize>,
}

impl TimeSlot {
    /// The option that counts as chosen
    pub fn chosen(&self) -> Option<&Activity> {
        self.options.get(self.selected.unwrap_or(0))
    }

    pub fn overlaps(&self, start: ClockTime, end: ClockTime) -> bool {
        self.start_time < end && start < self.end_time
    }

    /// Meal windows are the ones whose leading option is a meal
    pub fn is_meal(&self) -> bool {
        self.options.first().is_some_and(|a| a.is_meal())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Flights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<FlightOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<FlightOption>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lodging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<HotelOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLine {
    pub label: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub breakdown: Vec<PriceLine>,
    #[serde(rename = "totalEstimated", default)]
    pub total_estimated: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Travelers {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
}

impl Travelers {
    pub fn total(&self) -> u32 {
        self.adults + self.children
    }
}

/// A complete day-by-day itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub schema_version: u32,
    pub origin: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: u32,
    #[serde(default)]
    pub summary: String,
    pub travelers: Travelers,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub flights: Flights,
    #[serde(default)]
    pub lodging: Lodging,
    #[serde(default)]
    pub time_slots: Vec<TimeSlot>,
    #[serde(default)]
    pub weather: Vec<WeatherDay>,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Bumped by every successful revision or edit
    #[serde(default)]
    pub revision: u32,
    /// Next slot sequence number; never decreases
    #[serde(default)]
    pub slot_seq: u64,
}

fn default_currency() -> String {
    "EUR".to_string()
}

/// Day count for a date range, never less than one
pub fn total_days_between(start: NaiveDate, end: NaiveDate) -> u32 {
    (end - start).num_days().max(1) as u32
}

impl Plan {
    /// Empty plan skeleton for a date range
    pub fn skeleton(
        origin: &str,
        destination: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        travelers: Travelers,
        currency: &str,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            origin: origin.to_string(),
            destination: destination.to_string(),
            start_date,
            end_date,
            total_days: total_days_between(start_date, end_date),
            summary: String::new(),
            travelers,
            currency: currency.to_string(),
            flights: Flights::default(),
            lodging: Lodging::default(),
            time_slots: Vec::new(),
            weather: Vec::new(),
            pricing: Pricing::default(),
            warnings: Vec::new(),
            revision: 0,
            slot_seq: 0,
        }
    }

    /// Calendar date of a 1-based day number
    pub fn date_of_day(&self, day: u32) -> NaiveDate {
        self.start_date
            .checked_add_days(Days::new(u64::from(day.saturating_sub(1))))
            .unwrap_or(self.start_date)
    }

    pub fn weather_for_day(&self, day: u32) -> Option<&WeatherDay> {
        let date = self.date_of_day(day);
        self.weather.iter().find(|w| w.date == date)
    }

    /// Allocate a fresh slot id; sequence numbers are never handed out twice
    pub fn next_slot_id(&mut self, day: u32, start: ClockTime) -> String {
        let seq = self.slot_seq;
        self.slot_seq += 1;
        format!("d{}-{}-{}", day, start.compact(), seq)
    }

    pub fn slot(&self, id: &str) -> Option<&TimeSlot> {
        self.time_slots.iter().find(|s| s.id == id)
    }

    pub fn slot_mut(&mut self, id: &str) -> Option<&mut TimeSlot> {
        self.time_slots.iter_mut().find(|s| s.id == id)
    }

    pub fn slots_on_day(&self, day: u32) -> impl Iterator<Item = &TimeSlot> {
        self.time_slots.iter().filter(move |s| s.day == day)
    }

    /// Order slots by day then start time
    pub fn sort_slots(&mut self) {
        self.time_slots.sort_by(|a, b| (a.day, a.start_time).cmp(&(b.day, b.start_time)));
    }

    /// Check every structural invariant
    pub fn validate(&self) -> Result<(), PlanError> {
        debug!(destination = %self.destination, slots = self.time_slots.len(), "validate: called");
        if self.schema_version != SCHEMA_VERSION {
            return Err(PlanError::UnsupportedVersion(u64::from(self.schema_version)));
        }
        if self.end_date < self.start_date {
            return Err(PlanError::Invalid(format!(
                "end_date {} is before start_date {}",
                self.end_date, self.start_date
            )));
        }
        let expected_days = total_days_between(self.start_date, self.end_date);
        if self.total_days != expected_days {
            return Err(PlanError::Invalid(format!(
                "total_days is {} but the date range spans {}",
                self.total_days, expected_days
            )));
        }

        let mut ids = HashSet::new();
        let mut previous: Option<&TimeSlot> = None;
        for slot in &self.time_slots {
            if !ids.insert(slot.id.as_str()) {
                return Err(PlanError::Invalid(format!("duplicate slot id {}", slot.id)));
            }
            if slot.day < 1 || slot.day > self.total_days {
                return Err(PlanError::Invalid(format!(
                    "slot {} is on day {} outside 1..={}",
                    slot.id, slot.day, self.total_days
                )));
            }
            if slot.start_time >= slot.end_time {
                return Err(PlanError::Invalid(format!(
                    "slot {} starts at {} but ends at {}",
                    slot.id, slot.start_time, slot.end_time
                )));
            }
            if slot.options.is_empty() {
                return Err(PlanError::Invalid(format!("slot {} has no options", slot.id)));
            }
            if let Some(selected) = slot.selected
                && selected >= slot.options.len()
            {
                return Err(PlanError::Invalid(format!(
                    "slot {} selects option {} of {}",
                    slot.id,
                    selected,
                    slot.options.len()
                )));
            }
            if let Some(prev) = previous {
                if (prev.day, prev.start_time) > (slot.day, slot.start_time) {
                    return Err(PlanError::Invalid(format!("slot {} is out of order", slot.id)));
                }
                if prev.day == slot.day && prev.end_time > slot.start_time {
                    return Err(PlanError::Invalid(format!("slot {} overlaps slot {}", slot.id, prev.id)));
                }
            }
            previous = Some(slot);
        }
        Ok(())
    }

    /// Parse and validate a foreign plan payload, upgrading version 0
    pub fn from_json(payload: &str) -> Result<Self, PlanError> {
        debug!(len = payload.len(), "from_json: called");
        let mut value: serde_json::Value = serde_json::from_str(payload)?;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| PlanError::Invalid("plan payload is not an object".to_string()))?;

        let version = match obj.get("schema_version") {
            None => 0,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| PlanError::Invalid("schema_version is not a number".to_string()))?,
        };
        match version {
            0 => {
                debug!("from_json: upgrading version 0 payload");
                obj.insert("schema_version".to_string(), SCHEMA_VERSION.into());
            }
            v if v == u64::from(SCHEMA_VERSION) => {}
            v => return Err(PlanError::UnsupportedVersion(v)),
        }

        let mut plan: Plan = serde_json::from_value(value)?;
        plan.reconcile_slot_seq();
        plan.validate()?;
        Ok(plan)
    }

    /// Make sure `slot_seq` is past every sequence number already in use
    pub fn reconcile_slot_seq(&mut self) {
        let highest = self
            .time_slots
            .iter()
            .filter_map(|s| s.id.rsplit('-').next()?.parse::<u64>().ok())
            .max();
        let floor = highest.map(|h| h + 1).unwrap_or(0).max(self.time_slots.len() as u64);
        self.slot_seq = self.slot_seq.max(floor);
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_plan;
    use super::*;

    #[test]
    fn test_total_days() {
        let start = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        assert_eq!(total_days_between(start, NaiveDate::from_ymd_opt(2025, 11, 23).unwrap()), 3);
        assert_eq!(total_days_between(start, start), 1);
    }

    #[test]
    fn test_sample_plan_is_valid() {
        let plan = sample_plan();
        plan.validate().unwrap();
        assert_eq!(plan.time_slots[0].id, "d1-0900-0");
        assert_eq!(plan.slot_seq, 6);
        assert_eq!(plan.date_of_day(3), NaiveDate::from_ymd_opt(2025, 11, 22).unwrap());
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let mut plan = sample_plan();
        plan.time_slots[1].start_time = "11:00".parse().unwrap();
        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("overlaps"));
    }

    #[test]
    fn test_validate_rejects_bad_selection_and_day() {
        let mut plan = sample_plan();
        plan.time_slots[0].selected = Some(3);
        assert!(plan.validate().is_err());

        let mut plan = sample_plan();
        plan.time_slots.last_mut().unwrap().day = 4;
        assert!(plan.validate().is_err());

        let mut plan = sample_plan();
        plan.time_slots[0].options.clear();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_from_json_upgrades_version_zero() {
        let plan = sample_plan();
        let mut value = serde_json::to_value(&plan).unwrap();
        let obj = value.as_object_mut().unwrap();
        obj.remove("schema_version");
        obj.remove("slot_seq");

        let parsed = Plan::from_json(&value.to_string()).unwrap();
        assert_eq!(parsed.schema_version, SCHEMA_VERSION);
        assert_eq!(parsed.slot_seq, 6);
        assert_eq!(parsed.time_slots, plan.time_slots);
    }

    #[test]
    fn test_from_json_rejects_unknown_version_and_invalid_plans() {
        let plan = sample_plan();
        let mut value = serde_json::to_value(&plan).unwrap();
        value["schema_version"] = 7.into();
        assert!(matches!(
            Plan::from_json(&value.to_string()),
            Err(PlanError::UnsupportedVersion(7))
        ));

        let mut value = serde_json::to_value(&plan).unwrap();
        value["time_slots"][0]["endTime"] = "08:00".into();
        assert!(matches!(Plan::from_json(&value.to_string()), Err(PlanError::Invalid(_))));

        assert!(matches!(Plan::from_json("[1,2]"), Err(PlanError::Invalid(_))));
        assert!(matches!(Plan::from_json("{"), Err(PlanError::Malformed(_))));
    }

    #[test]
    fn test_serialized_field_names() {
        let plan = sample_plan();
        let value = serde_json::to_value(&plan).unwrap();
        assert!(value["time_slots"][0].get("startTime").is_some());
        assert!(value["pricing"].get("totalEstimated").is_some());
        assert_eq!(value["time_slots"][0]["options"][0]["category"], "sightseeing");
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        let a: Activity = serde_json::from_str(r#"{"id":"x","title":"Y","category":"karaoke"}"#).unwrap();
        assert_eq!(a.category, Some(Category::Other));
    }
}
