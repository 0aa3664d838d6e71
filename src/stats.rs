use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::models::Event;

/// Dashboard summary for a set of events, recomputed on every call.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Statistics {
    pub active_count: usize,
    pub total_attendees: u64,
    pub total_revenue: f64,
    pub average_fill_percent: u32,
}

pub fn summarize(events: &[Event]) -> Statistics {
    if events.is_empty() {
        return Statistics::default();
    }

    let active_count = events.iter().filter(|event| !event.is_past()).count();
    let total_attendees = events.iter().map(|event| u64::from(event.attendees)).sum();
    let total_revenue = events
        .iter()
        .map(|event| f64::from(event.attendees) * event.price_or_zero())
        .sum();
    let fill_sum: f64 = events.iter().map(fill_ratio).sum();
    let average_fill_percent = (fill_sum / events.len() as f64 * 100.0).round() as u32;

    Statistics {
        active_count,
        total_attendees,
        total_revenue,
        average_fill_percent,
    }
}

/// Attendees over capacity. A zero capacity contributes nothing.
pub fn fill_ratio(event: &Event) -> f64 {
    if event.capacity == 0 {
        return 0.0;
    }
    f64::from(event.attendees) / f64::from(event.capacity)
}

pub fn fill_percent(event: &Event) -> u32 {
    (fill_ratio(event) * 100.0).round() as u32
}

/// Earliest event that is not Past and starts at or after `now`.
pub fn next_upcoming(events: &[Event], now: DateTime<Utc>, tz: Tz) -> Option<&Event> {
    events
        .iter()
        .filter(|event| !event.is_past())
        .filter_map(|event| event.start_at(tz).map(|start| (start, event)))
        .filter(|(start, _)| *start >= now)
        .min_by_key(|(start, _)| *start)
        .map(|(_, event)| event)
}
