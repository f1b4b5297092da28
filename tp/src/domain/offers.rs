//! Provider offers that end up embedded in a plan

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::clock::ClockTime;

/// One leg of a flight itinerary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSegment {
    pub from: String,
    pub to: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    #[serde(default)]
    pub carrier: String,
    #[serde(default)]
    pub flight_number: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightDirection {
    #[default]
    Outbound,
    Inbound,
}

/// A bookable flight in one direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightOption {
    pub provider: String,
    #[serde(default)]
    pub direction: FlightDirection,
    pub price: f64,
    pub currency: String,
    pub segments: Vec<FlightSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
}

impl FlightOption {
    /// Departure of the first segment
    pub fn departs_at(&self) -> Option<NaiveDateTime> {
        self.segments.first().map(|s| s.departure)
    }

    /// Arrival of the last segment
    pub fn arrives_at(&self) -> Option<NaiveDateTime> {
        self.segments.last().map(|s| s.arrival)
    }

    /// Local time of day the traveller lands, if it lands on `date`
    pub fn arrival_time_on(&self, date: NaiveDate) -> Option<ClockTime> {
        self.arrives_at()
            .filter(|at| at.date() == date)
            .and_then(|at| to_clock(&at))
    }

    /// Local time of day the flight leaves, if it leaves on `date`
    pub fn departure_time_on(&self, date: NaiveDate) -> Option<ClockTime> {
        self.departs_at()
            .filter(|at| at.date() == date)
            .and_then(|at| to_clock(&at))
    }
}

fn to_clock(at: &NaiveDateTime) -> Option<ClockTime> {
    use chrono::Timelike;
    ClockTime::new(at.hour() as u16, at.minute() as u16)
}

/// A lodging offer for the whole stay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelOption {
    pub provider: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood: Option<String>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub price_total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
}

/// Forecast for a single day at the destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDay {
    pub date: NaiveDate,
    pub high_c: f32,
    pub low_c: f32,
    /// Probability of precipitation in [0, 1]
    pub precipitation_chance: f32,
    #[serde(default)]
    pub summary: String,
}

impl WeatherDay {
    pub fn is_wet(&self, threshold: f32) -> bool {
        self.precipitation_chance >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_flight_times_on_date() {
        let flight = FlightOption {
            provider: "test".into(),
            direction: FlightDirection::Outbound,
            price: 210.0,
            currency: "EUR".into(),
            segments: vec![
                FlightSegment {
                    from: "IST".into(),
                    to: "VIE".into(),
                    departure: at("2025-11-20", "07:15"),
                    arrival: at("2025-11-20", "08:40"),
                    carrier: "OS".into(),
                    flight_number: "OS838".into(),
                },
                FlightSegment {
                    from: "VIE".into(),
                    to: "BER".into(),
                    departure: at("2025-11-20", "10:05"),
                    arrival: at("2025-11-20", "11:20"),
                    carrier: "OS".into(),
                    flight_number: "OS233".into(),
                },
            ],
            booking_url: None,
        };
        let day = NaiveDate::from_ymd_opt(2025, 11, 20).unwrap();
        assert_eq!(flight.arrival_time_on(day).unwrap().to_string(), "11:20");
        assert_eq!(flight.departure_time_on(day).unwrap().to_string(), "07:15");
        let other = NaiveDate::from_ymd_opt(2025, 11, 21).unwrap();
        assert!(flight.arrival_time_on(other).is_none());
    }
}
