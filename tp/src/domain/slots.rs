//! Dialogue slots collected over a conversation

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::plan::Travelers;

/// Named trip parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    Origin,
    Destination,
    StartDate,
    EndDate,
    Adults,
    Children,
    Preferences,
    Budget,
}

impl SlotName {
    /// Slots that must be filled before a plan can be generated
    pub const REQUIRED: [SlotName; 5] = [
        SlotName::Origin,
        SlotName::Destination,
        SlotName::StartDate,
        SlotName::EndDate,
        SlotName::Adults,
    ];

    pub fn is_required(&self) -> bool {
        Self::REQUIRED.contains(self)
    }

    /// Clarifying question for a missing slot
    pub fn question(&self) -> &'static str {
        match self {
            Self::Origin => "Where will you be travelling from?",
            Self::Destination => "Where would you like to go?",
            Self::StartDate => "What are your travel dates? Please give a start date (YYYY-MM-DD).",
            Self::EndDate => "What are your travel dates? When do you come back (YYYY-MM-DD)?",
            Self::Adults => "How many adults are travelling?",
            Self::Children => "Are any children travelling with you?",
            Self::Preferences => "What do you enjoy doing when you travel?",
            Self::Budget => "Do you have a budget in mind?",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Origin => "origin",
            Self::Destination => "destination",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::Adults => "adults",
            Self::Children => "children",
            Self::Preferences => "preferences",
            Self::Budget => "budget",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Slots collected so far in a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adults: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
}

/// A partial slot update; `None` leaves a slot untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlotPatch {
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub adults: Option<u32>,
    #[serde(default)]
    pub children: Option<u32>,
    #[serde(default)]
    pub preferences: Option<Vec<String>>,
    #[serde(default)]
    pub budget: Option<String>,
}

impl SlotPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Minimum request a plan can be built from
#[derive(Debug, Clone, PartialEq)]
pub struct TripRequest {
    pub origin: String,
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub travelers: Travelers,
    pub preferences: Vec<String>,
    pub budget: Option<String>,
}

fn assign<T: PartialEq>(slot: &mut Option<T>, value: Option<T>, name: SlotName, changed: &mut Vec<SlotName>) {
    if let Some(v) = value
        && slot.as_ref() != Some(&v)
    {
        *slot = Some(v);
        changed.push(name);
    }
}

impl TripSlots {
    /// Apply a patch last-write-wins, returning the slots whose value changed
    pub fn merge(&mut self, patch: SlotPatch) -> Vec<SlotName> {
        let mut changed = Vec::new();
        let clean = |s: Option<String>| s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        assign(&mut self.origin, clean(patch.origin), SlotName::Origin, &mut changed);
        assign(&mut self.destination, clean(patch.destination), SlotName::Destination, &mut changed);
        assign(&mut self.start_date, patch.start_date, SlotName::StartDate, &mut changed);
        assign(&mut self.end_date, patch.end_date, SlotName::EndDate, &mut changed);
        assign(&mut self.adults, patch.adults, SlotName::Adults, &mut changed);
        assign(&mut self.children, patch.children, SlotName::Children, &mut changed);
        assign(&mut self.budget, clean(patch.budget), SlotName::Budget, &mut changed);
        if let Some(prefs) = patch.preferences
            && prefs != self.preferences
        {
            self.preferences = prefs;
            changed.push(SlotName::Preferences);
        }
        changed
    }

    /// Required slots still empty, in asking order
    pub fn missing_required(&self) -> Vec<SlotName> {
        SlotName::REQUIRED
            .into_iter()
            .filter(|name| match name {
                SlotName::Origin => self.origin.is_none(),
                SlotName::Destination => self.destination.is_none(),
                SlotName::StartDate => self.start_date.is_none(),
                SlotName::EndDate => self.end_date.is_none(),
                SlotName::Adults => self.adults.is_none(),
                _ => false,
            })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Build a plan request, or explain what is missing or inconsistent
    pub fn to_request(&self) -> Result<TripRequest, String> {
        let missing = self.missing_required();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|m| m.as_str()).collect();
            return Err(format!("missing required trip details: {}", names.join(", ")));
        }
        let (Some(origin), Some(destination), Some(start_date), Some(end_date), Some(adults)) = (
            self.origin.clone(),
            self.destination.clone(),
            self.start_date,
            self.end_date,
            self.adults,
        ) else {
            return Err("missing required trip details".to_string());
        };
        if end_date < start_date {
            return Err(format!("end date {} is before start date {}", end_date, start_date));
        }
        let travelers = Travelers {
            adults,
            children: self.children.unwrap_or(0),
        };
        if travelers.total() == 0 {
            return Err("at least one traveler is required".to_string());
        }
        Ok(TripRequest {
            origin,
            destination,
            start_date,
            end_date,
            travelers,
            preferences: self.preferences.clone(),
            budget: self.budget.clone(),
        })
    }
}
