//! Offline gateway built from per-time-of-day templates
//!
//! Knows nothing about real flights, hotels or weather and answers those
//! calls with empty lists. Activity slots are generated from fixed windows
//! with four ranked options each, rain-aware and preference-aware.

use async_trait::async_trait;
use tracing::debug;

use super::{
    ActivityContext, AlternativesQuery, DayHint, FlightQuery, ForecastQuery, HotelQuery, Pacing, ProviderError,
    ProviderGateway,
};
use crate::domain::{Activity, Category, ClockTime, FlightOption, HotelOption, TimeSlot, WeatherDay};

/// Options generated per slot
pub const OPTIONS_PER_SLOT: usize = 4;

struct Template {
    title: &'static str,
    description: &'static str,
    category: Category,
    price: f64,
    duration: &'static str,
}

struct Window {
    key: &'static str,
    start: u16,
    end: u16,
    pool: &'static [Template],
}

const fn hm(h: u16, m: u16) -> u16 {
    h * 60 + m
}

macro_rules! tpl {
    ($title:expr, $desc:expr, $cat:ident, $price:expr, $dur:expr) => {
        Template {
            title: $title,
            description: $desc,
            category: Category::$cat,
            price: $price,
            duration: $dur,
        }
    };
}

const BREAKFAST: &[Template] = &[
    tpl!("Breakfast at a local bakery", "Fresh pastries and coffee the way locals start the day in {city}.", Breakfast, 12.0, "45 min"),
    tpl!("Brunch café", "Relaxed brunch with seasonal dishes.", Breakfast, 18.0, "1 h"),
    tpl!("Hotel breakfast", "Unhurried breakfast before heading out.", Breakfast, 15.0, "45 min"),
    tpl!("Market breakfast stalls", "Street food breakfast at the morning market.", Breakfast, 9.0, "45 min"),
    tpl!("Rooftop coffee", "Coffee with a view over {city}.", Breakfast, 8.0, "30 min"),
    tpl!("Traditional breakfast house", "Regional breakfast specialities.", Breakfast, 16.0, "1 h"),
];

const MORNING: &[Template] = &[
    tpl!("Old town walking tour", "Guided walk through the historic centre of {city}.", Sightseeing, 20.0, "2.5 h"),
    tpl!("City museum", "The main collection on the history of {city}.", Culture, 15.0, "2 h"),
    tpl!("Botanical garden", "Morning stroll among glasshouses and gardens.", Nature, 8.0, "2 h"),
    tpl!("Landmark viewpoint", "The classic panorama of {city}.", Sightseeing, 12.0, "1.5 h"),
    tpl!("Art gallery", "Modern and classic art under one roof.", Culture, 14.0, "2 h"),
    tpl!("Bike tour", "See the highlights of {city} on two wheels.", Activity, 30.0, "2.5 h"),
];

const LUNCH: &[Template] = &[
    tpl!("Lunch at a neighbourhood bistro", "Daily menu with local produce.", Lunch, 22.0, "1 h"),
    tpl!("Food hall lunch", "Pick and mix from a dozen stalls.", Lunch, 16.0, "1 h"),
    tpl!("Street food tasting", "The snacks {city} is known for.", Lunch, 12.0, "1 h"),
    tpl!("Riverside restaurant", "Lunch with a view of the water.", Lunch, 30.0, "1.25 h"),
    tpl!("Vegetarian kitchen", "Seasonal plant-based plates.", Lunch, 18.0, "1 h"),
    tpl!("Classic tavern", "Hearty regional dishes.", Lunch, 24.0, "1.25 h"),
];

const AFTERNOON: &[Template] = &[
    tpl!("Historic palace and gardens", "Grand rooms and formal gardens.", Sightseeing, 18.0, "3 h"),
    tpl!("Design and shopping district", "Independent shops and concept stores.", Shopping, 0.0, "2.5 h"),
    tpl!("Science museum", "Hands-on exhibits for all ages.", Culture, 16.0, "2.5 h"),
    tpl!("Park and lakeside walk", "Green space and a lakeside loop.", Nature, 0.0, "2.5 h"),
    tpl!("Spa and thermal baths", "Slow afternoon in the baths.", Relaxation, 35.0, "3 h"),
    tpl!("Boat tour", "See {city} from the water.", Activity, 25.0, "1.5 h"),
];

const DINNER: &[Template] = &[
    tpl!("Dinner at a local favourite", "The restaurant locals recommend in {city}.", Dinner, 40.0, "1.5 h"),
    tpl!("Tasting menu", "Chef's seasonal tasting menu.", Dinner, 85.0, "2.5 h"),
    tpl!("Family-run trattoria", "Simple, generous home cooking.", Dinner, 30.0, "1.5 h"),
    tpl!("Night market dinner", "Graze through the evening market.", Dinner, 20.0, "1.5 h"),
    tpl!("Rooftop restaurant", "Dinner with the skyline of {city}.", Dinner, 60.0, "2 h"),
    tpl!("Wine bar with small plates", "Regional wines and sharing plates.", Dinner, 35.0, "1.5 h"),
];

const EVENING: &[Template] = &[
    tpl!("Live music bar", "Local bands in a cosy venue.", Nightlife, 15.0, "2 h"),
    tpl!("Evening city lights walk", "The illuminated landmarks of {city}.", Sightseeing, 0.0, "1.5 h"),
    tpl!("Theatre or concert", "An evening performance.", Culture, 45.0, "2.5 h"),
    tpl!("Cocktail lounge", "Signature drinks in a quiet lounge.", Nightlife, 25.0, "1.5 h"),
    tpl!("Night cruise", "Short cruise after dark.", Activity, 28.0, "1.5 h"),
    tpl!("Late-night dessert spot", "Something sweet to end the day.", Dinner, 10.0, "45 min"),
];

const WINDOWS: &[Window] = &[
    Window { key: "breakfast", start: hm(8, 0), end: hm(9, 0), pool: BREAKFAST },
    Window { key: "morning", start: hm(9, 30), end: hm(12, 0), pool: MORNING },
    Window { key: "lunch", start: hm(12, 30), end: hm(13, 45), pool: LUNCH },
    Window { key: "afternoon", start: hm(14, 30), end: hm(17, 30), pool: AFTERNOON },
    Window { key: "dinner", start: hm(19, 0), end: hm(20, 30), pool: DINNER },
    Window { key: "evening", start: hm(21, 0), end: hm(22, 30), pool: EVENING },
];

fn windows_for(pacing: Pacing) -> &'static [&'static str] {
    match pacing {
        Pacing::Light => &["breakfast", "lunch", "afternoon", "dinner"],
        Pacing::Balanced => &["breakfast", "morning", "lunch", "afternoon", "dinner"],
        Pacing::Busy => &["breakfast", "morning", "lunch", "afternoon", "dinner", "evening"],
    }
}

/// Template window whose start is closest to `start`
fn window_at(start: ClockTime) -> &'static Window {
    let mut best = &WINDOWS[0];
    for window in WINDOWS {
        if window.start.abs_diff(start.minutes()) < best.start.abs_diff(start.minutes()) {
            best = window;
        }
    }
    best
}

fn slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn preference_match(category: Category, preferences: &[String]) -> bool {
    preferences
        .iter()
        .flat_map(|p| p.split_whitespace())
        .any(|word| Category::from_keyword(word) == Some(category))
}

/// Pool indices ranked for the day: preferences first, then indoor on wet days
fn ranked(window: &Window, wet: bool, preferences: &[String]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..window.pool.len()).collect();
    indices.sort_by_key(|&i| {
        let t = &window.pool[i];
        let pref = !preference_match(t.category, preferences);
        let weather = wet && !t.category.is_indoor();
        (pref, weather)
    });
    indices
}

fn build_activity(window: &Window, index: usize, day: u32, city: &str, near: Option<&str>) -> Activity {
    let t = &window.pool[index];
    let id = match near {
        Some(area) => format!("tpl-{}-{}-d{}-{}", window.key, index, day, slug(area)),
        None => format!("tpl-{}-{}-d{}", window.key, index, day),
    };
    let title = match near {
        Some(area) => format!("{} near {}", t.title, area),
        None => t.title.to_string(),
    };
    Activity {
        id,
        title,
        description: t.description.replace("{city}", city),
        duration: Some(t.duration.to_string()),
        price: Some(t.price),
        location: Some(match near {
            Some(area) => format!("{}, {}", area, city),
            None => city.to_string(),
        }),
        rating: None,
        category: Some(t.category),
        booking_url: None,
    }
}

/// Offline template gateway
#[derive(Debug, Default, Clone)]
pub struct TemplateGateway;

impl TemplateGateway {
    pub fn new() -> Self {
        Self
    }

    fn day_slots(&self, context: &ActivityContext, hint: &DayHint) -> Vec<TimeSlot> {
        let keys = windows_for(hint.pacing);
        WINDOWS
            .iter()
            .filter(|w| keys.contains(&w.key))
            .filter(|w| hint.earliest_start.is_none_or(|at| w.start >= at.minutes()))
            .filter(|w| hint.latest_end.is_none_or(|at| w.end <= at.minutes()))
            .map(|w| {
                let options = ranked(w, hint.wet, &context.preferences)
                    .into_iter()
                    .take(OPTIONS_PER_SLOT)
                    .map(|i| build_activity(w, i, hint.day, &context.destination, context.lodging_area.as_deref()))
                    .collect();
                TimeSlot {
                    id: format!("d{}-{}", hint.day, w.key),
                    day: hint.day,
                    start_time: ClockTime::from_minutes(w.start),
                    end_time: ClockTime::from_minutes(w.end),
                    options,
                    selected: None,
                }
            })
            .collect()
    }
}

#[async_trait]
impl ProviderGateway for TemplateGateway {
    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<FlightOption>, ProviderError> {
        debug!(origin = %query.origin, destination = %query.destination, "search_flights: no offline flight data");
        Ok(Vec::new())
    }

    async fn search_hotels(&self, query: &HotelQuery) -> Result<Vec<HotelOption>, ProviderError> {
        debug!(destination = %query.destination, "search_hotels: no offline hotel data");
        Ok(Vec::new())
    }

    async fn forecast(&self, query: &ForecastQuery) -> Result<Vec<WeatherDay>, ProviderError> {
        debug!(destination = %query.destination, "forecast: no offline weather data");
        Ok(Vec::new())
    }

    async fn plan_activities(&self, context: &ActivityContext) -> Result<Vec<TimeSlot>, ProviderError> {
        debug!(destination = %context.destination, days = context.days.len(), "plan_activities: called");
        Ok(context.days.iter().flat_map(|hint| self.day_slots(context, hint)).collect())
    }

    async fn alternatives(&self, query: &AlternativesQuery) -> Result<Vec<Activity>, ProviderError> {
        debug!(day = query.day, start = %query.start, excluded = query.exclude_ids.len(), "alternatives: called");
        let window = window_at(query.start);
        Ok(ranked(window, false, &query.preferences)
            .into_iter()
            .map(|i| build_activity(window, i, query.day, &query.destination, query.near.as_deref()))
            .filter(|a| !query.exclude_ids.contains(&a.id))
            .take(OPTIONS_PER_SLOT)
            .collect())
    }
}
