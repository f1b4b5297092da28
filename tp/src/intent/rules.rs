//! Offline rule-based intent parser
//!
//! Understands the phrasings a form-like chat produces: "from X to Y",
//! ISO dates, "N adults", "for N nights", a handful of preference words and
//! change requests once a plan exists. Anything it cannot place becomes a
//! question for the first missing detail.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use regex::Regex;
use tracing::debug;

use super::{Intent, IntentError, IntentParser};
use crate::domain::{Category, SlotPatch, TripSlots};

const CITY: &str = r"(\p{Lu}[\p{L}'.-]*(?:\s+\p{Lu}[\p{L}'.-]*)*)";

pub struct RuleIntentParser {
    origin: Regex,
    destination: Regex,
    bare_city: Regex,
    date: Regex,
    duration: Regex,
    adults: Regex,
    children: Regex,
    solo: Regex,
    budget: Regex,
    likes: Regex,
    revision: Regex,
}

impl RuleIntentParser {
    pub fn new() -> Result<Self, regex::Error> {
        debug!("RuleIntentParser::new: called");
        Ok(Self {
            origin: Regex::new(&format!(r"(?:^|\s)(?i:from)\s+{CITY}"))?,
            destination: Regex::new(&format!(r"(?:^|\s)(?i:to|visit|visiting|in)\s+{CITY}"))?,
            bare_city: Regex::new(&format!(r"^\s*{CITY}\s*[.!]?\s*$"))?,
            date: Regex::new(r"\b(\d{4}-\d{2}-\d{2})\b")?,
            duration: Regex::new(r"(?i)\b(\d{1,2})\s*(?:days?|nights?)\b")?,
            adults: Regex::new(r"(?i)\b(\d{1,2})\s*(?:adults?|people|persons|travell?ers|of us)\b")?,
            children: Regex::new(r"(?i)\b(\d{1,2})\s*(?:children|child|kids?)\b")?,
            solo: Regex::new(r"(?i)\b(?:alone|solo|by myself|just me)\b")?,
            budget: Regex::new(
                r"(?i)\bbudget\s+(?:is\s+|of\s+)?((?:[€$£]\s*)?\d[\d,.]*\s*(?:k\b)?\s*(?:eur|euros?|usd|dollars?|gbp)?)",
            )?,
            likes: Regex::new(r"(?i)\b(?:love|like|enjoy|into|interested in|prefer|fan of)\b")?,
            revision: Regex::new(
                r"(?i)\b(?:relax|relaxed|lighter|slower|busier|packed|more|fewer|less|cheaper|hotel|change|swap|replace|no changes|keep it)\b",
            )?,
        })
    }

    fn date_patch(&self, text: &str, slots: &TripSlots, patch: &mut SlotPatch) {
        let dates: Vec<NaiveDate> = self
            .date
            .captures_iter(text)
            .filter_map(|c| c[1].parse().ok())
            .collect();
        match dates.as_slice() {
            [] => {}
            [only] if slots.start_date.is_some() && slots.end_date.is_none() => patch.end_date = Some(*only),
            [only] => patch.start_date = Some(*only),
            [start, end, ..] => {
                patch.start_date = Some(*start);
                patch.end_date = Some(*end);
            }
        }

        if patch.end_date.is_none()
            && let Some(c) = self.duration.captures(text)
            && let Ok(n) = c[1].parse::<u64>()
            && let Some(start) = patch.start_date.or(slots.start_date)
        {
            patch.end_date = start.checked_add_days(Days::new(n));
        }
    }

    fn preference_patch(&self, text: &str, slots: &TripSlots, patch: &mut SlotPatch) {
        if !self.likes.is_match(text) {
            return;
        }
        let mut preferences = slots.preferences.clone();
        for word in text.split(|c: char| !c.is_alphabetic()) {
            let word = word.to_lowercase();
            if Category::from_keyword(&word).is_some() && !preferences.contains(&word) {
                preferences.push(word);
            }
        }
        if preferences != slots.preferences {
            patch.preferences = Some(preferences);
        }
    }

    /// Everything in `text` that reads as a trip detail
    pub fn extract(&self, text: &str, slots: &TripSlots) -> SlotPatch {
        let mut patch = SlotPatch::default();
        if let Some(c) = self.origin.captures(text) {
            patch.origin = Some(c[1].to_string());
        }
        if let Some(c) = self.destination.captures(text) {
            patch.destination = Some(c[1].to_string());
        }
        if patch.origin.is_none()
            && patch.destination.is_none()
            && let Some(c) = self.bare_city.captures(text)
        {
            if slots.origin.is_none() {
                patch.origin = Some(c[1].to_string());
            } else if slots.destination.is_none() {
                patch.destination = Some(c[1].to_string());
            }
        }

        self.date_patch(text, slots, &mut patch);

        if let Some(c) = self.adults.captures(text) {
            patch.adults = c[1].parse().ok();
        } else if self.solo.is_match(text) {
            patch.adults = Some(1);
        }
        if let Some(c) = self.children.captures(text) {
            patch.children = c[1].parse().ok();
        }
        if let Some(c) = self.budget.captures(text) {
            patch.budget = Some(c[1].trim().to_string());
        }
        self.preference_patch(text, slots, &mut patch);
        patch
    }
}

#[async_trait]
impl IntentParser for RuleIntentParser {
    async fn parse(&self, text: &str, slots: &TripSlots, plan_exists: bool) -> Result<Intent, IntentError> {
        debug!(len = text.len(), %plan_exists, "RuleIntentParser::parse: called");
        let text = text.trim();
        if plan_exists && self.revision.is_match(text) {
            return Ok(Intent::Revision {
                instruction: text.to_string(),
            });
        }

        let patch = self.extract(text, slots);
        if !patch.is_empty() {
            return Ok(Intent::SlotUpdate { slots: patch });
        }
        if plan_exists && !text.is_empty() {
            return Ok(Intent::Revision {
                instruction: text.to_string(),
            });
        }

        let question = slots
            .missing_required()
            .first()
            .map(|slot| slot.question().to_string())
            .unwrap_or_else(|| "Could you tell me a bit more about the trip you have in mind?".to_string());
        Ok(Intent::NeedMore { question })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> RuleIntentParser {
        RuleIntentParser::new().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_full_request_in_one_message() {
        let intent = parser()
            .parse(
                "Trip from Istanbul to Berlin 2025-11-20 to 2025-11-23 for 2 adults and 1 child",
                &TripSlots::default(),
                false,
            )
            .await
            .unwrap();
        let Intent::SlotUpdate { slots } = intent else {
            panic!("expected slot update, got {intent:?}");
        };
        assert_eq!(slots.origin.as_deref(), Some("Istanbul"));
        assert_eq!(slots.destination.as_deref(), Some("Berlin"));
        assert_eq!(slots.start_date, Some(date("2025-11-20")));
        assert_eq!(slots.end_date, Some(date("2025-11-23")));
        assert_eq!(slots.adults, Some(2));
        assert_eq!(slots.children, Some(1));
    }

    #[tokio::test]
    async fn test_duration_relative_to_known_start() {
        let known = TripSlots {
            start_date: Some(date("2025-11-20")),
            ..Default::default()
        };
        let patch = parser().extract("we stay 4 nights", &known);
        assert_eq!(patch.end_date, Some(date("2025-11-24")));
    }

    #[tokio::test]
    async fn test_bare_city_fills_next_missing() {
        let slots = TripSlots {
            origin: Some("Istanbul".into()),
            ..Default::default()
        };
        let patch = parser().extract("Lisbon", &slots);
        assert_eq!(patch.destination.as_deref(), Some("Lisbon"));
        assert!(patch.origin.is_none());
    }

    #[tokio::test]
    async fn test_preferences_and_budget() {
        let patch = parser().extract("We love museums and parks, budget of €1500", &TripSlots::default());
        assert_eq!(patch.preferences, Some(vec!["museums".to_string(), "parks".to_string()]));
        assert_eq!(patch.budget.as_deref(), Some("€1500"));
    }

    #[tokio::test]
    async fn test_unknown_text_asks_first_missing() {
        let slots = TripSlots {
            origin: Some("Istanbul".into()),
            destination: Some("Berlin".into()),
            ..Default::default()
        };
        let intent = parser().parse("hmm not sure", &slots, false).await.unwrap();
        let Intent::NeedMore { question } = intent else {
            panic!("expected question");
        };
        assert!(question.contains("dates"));
    }

    #[tokio::test]
    async fn test_revision_only_with_plan() {
        let p = parser();
        let intent = p.parse("make day 2 more relaxed", &TripSlots::default(), true).await.unwrap();
        assert_eq!(intent.kind(), "revision");

        let intent = p.parse("make day 2 more relaxed", &TripSlots::default(), false).await.unwrap();
        assert_eq!(intent.kind(), "need_more");
    }

    #[tokio::test]
    async fn test_slot_change_after_plan() {
        let intent = parser()
            .parse("Actually we fly from Ankara", &TripSlots::default(), true)
            .await
            .unwrap();
        let Intent::SlotUpdate { slots } = intent else {
            panic!("expected slot update");
        };
        assert_eq!(slots.origin.as_deref(), Some("Ankara"));
    }
}
