//! Wall-clock time of day used by itinerary windows
//!
//! Serialized as `"HH:MM"`. Stored as minutes since midnight so window
//! arithmetic and overlap checks are plain integer comparisons.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Minutes in a day; `24:00` is accepted as an end-of-day marker
pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A time of day with minute precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Build from hours and minutes, `None` when out of range
    pub fn new(hours: u16, minutes: u16) -> Option<Self> {
        let total = hours.checked_mul(60)?.checked_add(minutes)?;
        if minutes >= 60 || total > MINUTES_PER_DAY {
            return None;
        }
        Some(Self(total))
    }

    /// Build from minutes since midnight, clamped to the end of the day
    pub const fn from_minutes(minutes: u16) -> Self {
        if minutes > MINUTES_PER_DAY {
            Self(MINUTES_PER_DAY)
        } else {
            Self(minutes)
        }
    }

    pub fn minutes(&self) -> u16 {
        self.0
    }

    pub fn hours(&self) -> u16 {
        self.0 / 60
    }

    /// Shift forward, saturating at end of day
    pub fn plus_minutes(&self, minutes: u16) -> Self {
        Self::from_minutes(self.0.saturating_add(minutes))
    }

    /// Shift backward, saturating at midnight
    pub fn minus_minutes(&self, minutes: u16) -> Self {
        Self(self.0.saturating_sub(minutes))
    }

    /// Compact `HHMM` form used inside slot ids
    pub fn compact(&self) -> String {
        format!("{:02}{:02}", self.0 / 60, self.0 % 60)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Error for malformed `HH:MM` strings
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time of day '{0}', expected HH:MM")]
pub struct ParseClockError(pub String);

impl FromStr for ClockTime {
    type Err = ParseClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseClockError(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(err());
        }
        let hours: u16 = h.parse().map_err(|_| err())?;
        let minutes: u16 = m.parse().map_err(|_| err())?;
        Self::new(hours, minutes).ok_or_else(err)
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
