//! Cost estimate, always recomputed from the current selections

use tracing::debug;

use crate::domain::{Plan, PriceLine, Pricing};

fn round2(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Rebuild `plan.pricing` from flights, lodging, chosen activities and transport
///
/// Activity prices are per person.
pub fn recompute(plan: &mut Plan, daily_transport: f64) {
    let mut breakdown = Vec::new();
    if let Some(outbound) = &plan.flights.outbound {
        breakdown.push(PriceLine {
            label: "Outbound flight".to_string(),
            amount: outbound.price,
        });
    }
    if let Some(inbound) = &plan.flights.inbound {
        breakdown.push(PriceLine {
            label: "Return flight".to_string(),
            amount: inbound.price,
        });
    }
    if let Some(hotel) = &plan.lodging.selected {
        breakdown.push(PriceLine {
            label: format!("Lodging: {}", hotel.name),
            amount: hotel.price_total,
        });
    }

    let per_person: f64 = plan
        .time_slots
        .iter()
        .filter_map(|s| s.chosen().and_then(|a| a.price))
        .sum();
    let activities = per_person * f64::from(plan.travelers.total());
    if activities > 0.0 {
        breakdown.push(PriceLine {
            label: "Activities and meals".to_string(),
            amount: round2(activities),
        });
    }

    let transport = daily_transport * f64::from(plan.total_days);
    if transport > 0.0 {
        breakdown.push(PriceLine {
            label: "Local transport".to_string(),
            amount: round2(transport),
        });
    }

    let total = round2(breakdown.iter().map(|l| l.amount).sum());
    debug!(lines = breakdown.len(), total, "recompute: called");
    plan.pricing = Pricing {
        breakdown,
        total_estimated: total,
    };
}
