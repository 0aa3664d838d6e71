pub mod config;
pub mod db;
pub mod fetch;
pub mod filter;
pub mod geo;
pub mod models;
pub mod source;
pub mod stats;
mod utils;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use serde::Serialize;

pub use filter::{
    filter_events, partition_by_bucket, Bucket, FilterContext, FilterCriteria, TimeWindow,
};
pub use models::{EnergyLevel, Event, EventStatus};
pub use stats::{summarize, Statistics};

/// Event as shown in a list or on the map, with the values the cards display.
#[derive(Debug, Serialize)]
pub struct EventCard {
    #[serde(flatten)]
    pub event: Event,
    pub distance_m: Option<f64>,
    pub fill_percent: u32,
}

impl EventCard {
    pub fn new(event: Event, ctx: &FilterContext) -> Self {
        let distance_m = event.distance_from(ctx.origin).map(f64::round);
        let fill_percent = stats::fill_percent(&event);
        Self {
            event,
            distance_m,
            fill_percent,
        }
    }
}

/// Everything the organizer dashboard renders for one set of events.
#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub stats: Statistics,
    pub next_event: Option<String>,
    pub upcoming: Vec<EventCard>,
    pub past: Vec<EventCard>,
}

pub fn dashboard(events: &[Event], ctx: &FilterContext) -> Dashboard {
    let stats = summarize(events);
    let next_event =
        stats::next_upcoming(events, ctx.now, ctx.timezone).map(|event| event.title.clone());
    let (upcoming, past) = partition_by_bucket(events);
    Dashboard {
        stats,
        next_event,
        upcoming: upcoming.into_iter().map(|e| EventCard::new(e, ctx)).collect(),
        past: past.into_iter().map(|e| EventCard::new(e, ctx)).collect(),
    }
}

/// Filtered list view for the event browser.
pub fn browse(events: &[Event], criteria: &FilterCriteria, ctx: &FilterContext) -> Vec<EventCard> {
    filter_events(events, criteria, ctx)
        .into_iter()
        .map(|event| EventCard::new(event, ctx))
        .collect()
}

/// Events without a stated end are booked for two hours.
const DEFAULT_CALENDAR_HOURS: i64 = 2;

/// What "add to calendar" writes to the user's calendar.
#[derive(Debug, Serialize, PartialEq)]
pub struct CalendarEntry {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
    pub notes: String,
}

/// `None` when the event has no usable start time.
pub fn calendar_entry(event: &Event, tz: Tz) -> Option<CalendarEntry> {
    let start = event.start_at(tz)?;
    let notes = match (&event.description, &event.organizer) {
        (Some(description), _) if !description.trim().is_empty() => description.clone(),
        (_, Some(organizer)) => format!("Hosted by {organizer}"),
        _ => String::new(),
    };
    Some(CalendarEntry {
        title: event.title.clone(),
        start,
        end: start + Duration::hours(DEFAULT_CALENDAR_HOURS),
        location: event.location.clone(),
        notes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn event(start: &str) -> Event {
        serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "Board Games Night",
            "start_time": start,
            "location": "Library Cafe",
            "organizer": "Games Society"
        }))
        .unwrap()
    }

    #[test]
    fn calendar_entry_defaults_to_two_hours() {
        let london = chrono_tz::Europe::London;
        let entry = calendar_entry(&event("2025-10-15T19:00:00"), london).unwrap();
        assert_eq!(
            entry,
            CalendarEntry {
                title: "Board Games Night".to_string(),
                start: Utc.with_ymd_and_hms(2025, 10, 15, 18, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 10, 15, 20, 0, 0).unwrap(),
                location: "Library Cafe".to_string(),
                notes: "Hosted by Games Society".to_string(),
            }
        );
    }

    #[test]
    fn calendar_entry_prefers_description_and_needs_a_start() {
        let mut described = event("2025-10-15T19:00:00Z");
        described.description = Some("Bring a game".to_string());
        let entry = calendar_entry(&described, chrono_tz::UTC).unwrap();
        assert_eq!(entry.notes, "Bring a game");

        assert!(calendar_entry(&event("soon"), chrono_tz::UTC).is_none());
    }
}
