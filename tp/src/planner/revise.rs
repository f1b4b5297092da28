//! Revision strategies
//!
//! A [`Reviser`] turns one instruction into a new plan. The heuristic one
//! understands a fixed set of phrasings and touches only what they name;
//! anything else comes back unchanged with an explanation.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};

use super::pacing::{self, LIGHT_DAY_ACTIVITY_QUOTA};
use super::with_deadline;
use crate::config::{PlanningConfig, ProviderTimeouts, ReviserKind};
use crate::domain::{Activity, Category, ClockTime, HotelOption, Plan, TimeSlot};
use crate::error::{PlannerError, PlannerResult};
use crate::llm::LlmClient;
use crate::prompts::PromptLoader;
use crate::provider::{AlternativesQuery, DayHint, HotelQuery, ProviderGateway};

/// Windows tried, in order, when a day needs one more activity
const EXTRA_WINDOWS: [(u16, u16); 3] = [(14 * 60 + 30, 17 * 60 + 30), (9 * 60 + 30, 12 * 60), (21 * 60, 22 * 60 + 30)];

/// Collaborators a reviser may consult
pub struct RevisionContext<'a> {
    pub gateway: &'a dyn ProviderGateway,
    pub timeouts: &'a ProviderTimeouts,
    pub planning: &'a PlanningConfig,
}

/// Outcome of one revision
#[derive(Debug, Clone, serde::Serialize)]
pub struct Revision {
    pub plan: Plan,
    /// Short description of what changed, or why nothing did
    pub summary: String,
    pub changed: bool,
}

impl Revision {
    pub fn changed(plan: Plan, summary: impl Into<String>) -> Self {
        Self {
            plan,
            summary: summary.into(),
            changed: true,
        }
    }

    pub fn unchanged(plan: &Plan, summary: impl Into<String>) -> Self {
        Self {
            plan: plan.clone(),
            summary: summary.into(),
            changed: false,
        }
    }
}

#[async_trait]
pub trait Reviser: Send + Sync {
    async fn revise(&self, plan: &Plan, instruction: &str, ctx: &RevisionContext<'_>) -> PlannerResult<Revision>;
}

/// Build the configured reviser
pub fn create_reviser(kind: ReviserKind, llm: Option<Arc<dyn LlmClient>>) -> PlannerResult<Arc<dyn Reviser>> {
    debug!(?kind, "create_reviser: called");
    match (kind, llm) {
        (ReviserKind::Heuristic, _) => Ok(Arc::new(HeuristicReviser::new()?)),
        (ReviserKind::Llm, Some(client)) => Ok(Arc::new(super::LlmReviser::new(client, PromptLoader::from_user_config()))),
        (ReviserKind::Llm, None) => Err(PlannerError::Validation(
            "planning.reviser is llm but no LLM client is configured".to_string(),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Keep,
    Lighter(Option<u32>),
    Busier(Option<u32>),
    Hotel { cheaper: bool },
    More(Category),
    Unknown,
}

/// Keyword-driven reviser
pub struct HeuristicReviser {
    /// The whole instruction is a no-op phrase
    noop_only: Regex,
    noop: Regex,
    day: Regex,
    lighter: Regex,
    busier: Regex,
    hotel: Regex,
    cheaper: Regex,
    more: Regex,
}

impl HeuristicReviser {
    pub fn new() -> PlannerResult<Self> {
        let re = |p: &str| Regex::new(p).map_err(|e| PlannerError::Validation(format!("reviser pattern: {e}")));
        Ok(Self {
            noop_only: re(
                r"(?i)^\s*(?:no changes?|keep it(?: as is)?|looks good|leave it(?: as is)?|as is|nothing(?: else)?)(?:,?\s*(?:please|thanks|thank you))?[\s.!]*$",
            )?,
            noop: re(r"(?i)\b(?:no changes?|keep it|looks good|leave it)\b")?,
            day: re(r"(?i)\b(?:day\s*(\d{1,2})|(first|last) day)\b")?,
            lighter: re(r"(?i)\b(?:relax\w*|light\w*|slow\w*|easier|less|fewer|calm\w*)\b")?,
            busier: re(r"(?i)\b(?:busier|busy|packed|fuller|more (?:to do|activities|things))\b")?,
            hotel: re(r"(?i)\b(?:hotel|lodging|accommodation|stay somewhere)\b")?,
            cheaper: re(r"(?i)\b(?:cheap\w*|budget|less expensive|lower price)\b")?,
            more: re(r"(?i)\bmore\s+(\p{L}+)")?,
        })
    }

    fn target_day(&self, text: &str, plan: &Plan) -> Option<u32> {
        let c = self.day.captures(text)?;
        if let Some(n) = c.get(1) {
            return n.as_str().parse().ok();
        }
        match c.get(2).map(|m| m.as_str().to_lowercase()) {
            Some(word) if word == "first" => Some(1),
            Some(_) => Some(plan.total_days),
            None => None,
        }
    }

    fn classify(&self, text: &str, plan: &Plan) -> Action {
        if self.noop_only.is_match(text) {
            return Action::Keep;
        }
        if self.hotel.is_match(text) {
            return Action::Hotel {
                cheaper: self.cheaper.is_match(text),
            };
        }
        if let Some(c) = self.more.captures(text)
            && let Some(category) = Category::from_keyword(&c[1])
        {
            return Action::More(category);
        }
        let day = self.target_day(text, plan);
        if self.busier.is_match(text) {
            return Action::Busier(day);
        }
        if self.lighter.is_match(text) {
            return Action::Lighter(day);
        }
        if self.noop.is_match(text) {
            return Action::Keep;
        }
        Action::Unknown
    }
}

/// Day with the most non-meal slots, earliest on ties
fn busiest_day(plan: &Plan) -> Option<u32> {
    (1..=plan.total_days)
        .map(|day| (day, plan.slots_on_day(day).filter(|s| !s.is_meal()).count()))
        .filter(|(_, n)| *n > 0)
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(day, _)| day)
}

fn check_day(plan: &Plan, day: u32) -> PlannerResult<()> {
    if day == 0 || day > plan.total_days {
        return Err(PlannerError::Validation(format!(
            "day {} is outside the trip (1-{})",
            day, plan.total_days
        )));
    }
    Ok(())
}

fn lighten(plan: &Plan, day: Option<u32>) -> PlannerResult<Revision> {
    let Some(day) = day.or_else(|| busiest_day(plan)) else {
        return Ok(Revision::unchanged(plan, "The itinerary is already as light as it gets."));
    };
    check_day(plan, day)?;
    let mut next = plan.clone();
    let mut kept = 0;
    let before = next.time_slots.len();
    next.time_slots.retain(|s| {
        if s.day != day || s.is_meal() {
            return true;
        }
        kept += 1;
        kept <= LIGHT_DAY_ACTIVITY_QUOTA
    });
    let dropped = before - next.time_slots.len();
    if dropped == 0 {
        return Ok(Revision::unchanged(plan, format!("Day {day} is already relaxed.")));
    }
    Ok(Revision::changed(
        next,
        format!("Made day {day} more relaxed by dropping {dropped} activity slot(s)."),
    ))
}

fn all_activity_ids(plan: &Plan) -> Vec<String> {
    plan.time_slots
        .iter()
        .flat_map(|s| s.options.iter().map(|a| a.id.clone()))
        .collect()
}

fn near_area(plan: &Plan) -> Option<String> {
    plan.lodging.selected.as_ref().and_then(|h| h.neighborhood.clone())
}

/// First extra window on `day` that is free and inside the day's bounds
fn free_window(plan: &Plan, hints: &[DayHint], day: u32) -> Option<(ClockTime, ClockTime)> {
    EXTRA_WINDOWS.iter().find_map(|&(start, end)| {
        let (start, end) = (ClockTime::from_minutes(start), ClockTime::from_minutes(end));
        let fits = pacing::fits(hints, day, start, end) && !plan.slots_on_day(day).any(|s| s.overlaps(start, end));
        fits.then_some((start, end))
    })
}

async fn busier(plan: &Plan, day: Option<u32>, ctx: &RevisionContext<'_>) -> PlannerResult<Revision> {
    let hints = pacing::plan_hints(plan, ctx.planning);
    let picked = match day {
        Some(day) => {
            check_day(plan, day)?;
            free_window(plan, &hints, day).map(|w| (day, w))
        }
        None => {
            // Emptiest day that still has room, earliest on ties
            let mut days: Vec<u32> = (1..=plan.total_days).collect();
            days.sort_by_key(|d| plan.slots_on_day(*d).count());
            days.into_iter().find_map(|d| free_window(plan, &hints, d).map(|w| (d, w)))
        }
    };
    let Some((day, (start, end))) = picked else {
        let which = day.map(|d| format!("Day {d}")).unwrap_or_else(|| "No day".to_string());
        return Ok(Revision::unchanged(plan, format!("{which} has no free window left.")));
    };

    let query = AlternativesQuery {
        day,
        start,
        end,
        destination: plan.destination.clone(),
        preferences: Vec::new(),
        exclude_ids: all_activity_ids(plan),
        near: near_area(plan),
    };
    let options = match with_deadline("alternatives", ctx.timeouts.alternatives, ctx.gateway.alternatives(&query)).await {
        Ok(options) => options,
        Err(e) => {
            warn!(error = %e, day, "busier: alternatives unavailable");
            return Ok(Revision::unchanged(plan, format!("Could not find more to do on day {day} right now.")));
        }
    };
    if options.is_empty() {
        return Ok(Revision::unchanged(plan, format!("Found nothing new to add on day {day}.")));
    }

    let mut next = plan.clone();
    let id = next.next_slot_id(day, start);
    let mut slot = TimeSlot {
        id,
        day,
        start_time: start,
        end_time: end,
        options,
        selected: None,
    };
    if is_wet(&hints, day) {
        pacing::indoor_first(&mut slot);
    }
    next.time_slots.push(slot);
    next.sort_slots();
    Ok(Revision::changed(next, format!("Added an activity on day {day} from {start} to {end}.")))
}

fn is_wet(hints: &[DayHint], day: u32) -> bool {
    hints.iter().any(|h| h.day == day && h.wet)
}

fn pick_hotel(offers: Vec<HotelOption>, current: Option<&HotelOption>, cheaper: bool) -> Option<HotelOption> {
    let others = offers
        .into_iter()
        .filter(|h| current.is_none_or(|c| c.name != h.name));
    if cheaper {
        others
            .filter(|h| current.is_none_or(|c| h.price_total < c.price_total))
            .min_by(|a, b| a.price_total.total_cmp(&b.price_total))
    } else {
        others.max_by(|a, b| {
            a.rating
                .unwrap_or(0.0)
                .total_cmp(&b.rating.unwrap_or(0.0))
                .then(b.price_total.total_cmp(&a.price_total))
        })
    }
}

async fn change_hotel(plan: &Plan, cheaper: bool, ctx: &RevisionContext<'_>) -> PlannerResult<Revision> {
    let query = HotelQuery {
        destination: plan.destination.clone(),
        check_in: plan.start_date,
        check_out: plan.end_date,
        travelers: plan.travelers,
        budget: None,
    };
    let offers = match with_deadline("hotels", ctx.timeouts.hotels, ctx.gateway.search_hotels(&query)).await {
        Ok(offers) => offers,
        Err(e) => {
            warn!(error = %e, "change_hotel: hotel search unavailable");
            return Ok(Revision::unchanged(plan, "Hotel search is unavailable right now; the plan is unchanged."));
        }
    };
    let Some(hotel) = pick_hotel(offers, plan.lodging.selected.as_ref(), cheaper) else {
        return Ok(Revision::unchanged(plan, "No other hotel matches that request."));
    };

    let mut next = plan.clone();
    let name = hotel.name.clone();
    next.lodging.selected = Some(hotel);

    let mut refreshed = 0;
    if let Some(area) = near_area(&next) {
        let exclude = all_activity_ids(&next);
        let hints = pacing::plan_hints(plan, ctx.planning);
        for slot in next
            .time_slots
            .iter_mut()
            .filter(|s| !s.is_meal() && s.selected.is_none())
            .filter(|s| pacing::fits(&hints, s.day, s.start_time, s.end_time))
        {
            let query = AlternativesQuery {
                day: slot.day,
                start: slot.start_time,
                end: slot.end_time,
                destination: plan.destination.clone(),
                preferences: Vec::new(),
                exclude_ids: exclude.clone(),
                near: Some(area.clone()),
            };
            match with_deadline("alternatives", ctx.timeouts.alternatives, ctx.gateway.alternatives(&query)).await {
                Ok(options) if !options.is_empty() => {
                    slot.options = options;
                    if is_wet(&hints, slot.day) {
                        pacing::indoor_first(slot);
                    }
                    refreshed += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, slot = %slot.id, "change_hotel: keeping old options");
                }
            }
        }
    }
    info!(hotel = %name, refreshed, "change_hotel: lodging replaced");
    Ok(Revision::changed(
        next,
        format!("Switched lodging to {name} and refreshed {refreshed} nearby activity slot(s)."),
    ))
}

fn promote(plan: &Plan, category: Category) -> Revision {
    let mut next = plan.clone();
    let mut touched = 0;
    for slot in next.time_slots.iter_mut().filter(|s| s.selected.is_none()) {
        let matches = |a: &Activity| a.category == Some(category);
        if slot.options.iter().any(matches) && !slot.options.first().is_some_and(matches) {
            slot.options.sort_by_key(|a| !matches(a));
            touched += 1;
        }
    }
    if touched == 0 {
        return Revision::unchanged(plan, format!("No further {} options to bring forward.", category.as_str()));
    }
    Revision::changed(
        next,
        format!("Put {} options first in {touched} slot(s).", category.as_str()),
    )
}

#[async_trait]
impl Reviser for HeuristicReviser {
    async fn revise(&self, plan: &Plan, instruction: &str, ctx: &RevisionContext<'_>) -> PlannerResult<Revision> {
        let action = self.classify(instruction, plan);
        debug!(?action, "HeuristicReviser::revise: called");
        match action {
            Action::Keep => Ok(Revision::unchanged(plan, "No changes made.")),
            Action::Lighter(day) => lighten(plan, day),
            Action::Busier(day) => busier(plan, day, ctx).await,
            Action::Hotel { cheaper } => change_hotel(plan, cheaper, ctx).await,
            Action::More(category) => Ok(promote(plan, category)),
            Action::Unknown => Ok(Revision::unchanged(
                plan,
                format!("I could not work out how to apply \"{}\"; the plan is unchanged.", instruction.trim()),
            )),
        }
    }
}
