use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use uninear_lib::db::Store;
use uninear_lib::fetch::parse_event_list;
use uninear_lib::filter::{Bucket, FilterContext, FilterCriteria, TimeWindow};
use uninear_lib::models::{EventDraft, EventStatus, EventUpdate};
use uninear_lib::{browse, dashboard, filter_events, summarize, Statistics};

fn draft(title: &str, start: &str, location: &str, capacity: u32, price: f64) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        start_time: start.to_string(),
        location: location.to_string(),
        capacity,
        price,
        ..Default::default()
    }
}

#[test]
fn organizer_flow_from_store_to_dashboard() {
    let store = Store::open_in_memory().unwrap();
    let hackathon = store
        .create_event(draft(
            "Annual Tech Hackathon",
            "2025-10-15T09:00:00",
            "Engineering Hub",
            200,
            15.0,
        ))
        .unwrap();
    let panel = store
        .create_event(draft(
            "Industry Panel Night",
            "2025-10-22T18:30:00",
            "Main Auditorium",
            150,
            0.0,
        ))
        .unwrap();

    store
        .update_event(
            &hackathon.id,
            EventUpdate {
                attendees: Some(142),
                status: Some(EventStatus::Published),
                ..Default::default()
            },
        )
        .unwrap();
    store
        .update_event(
            &panel.id,
            EventUpdate {
                attendees: Some(89),
                ..Default::default()
            },
        )
        .unwrap();

    let events = store.list_events().unwrap();
    assert_eq!(
        summarize(&events),
        Statistics {
            active_count: 2,
            total_attendees: 231,
            total_revenue: 2130.0,
            average_fill_percent: 65,
        }
    );

    let now = Utc.with_ymd_and_hms(2025, 10, 1, 12, 0, 0).unwrap();
    let view = dashboard(&events, &FilterContext::at(now));
    assert_eq!(view.next_event.as_deref(), Some("Annual Tech Hackathon"));
    assert_eq!(view.upcoming.len(), 2);
    assert!(view.past.is_empty());
    assert_eq!(view.upcoming[0].fill_percent, 71);
}

#[test]
fn mobile_browse_over_fetched_payload() {
    let now = Utc.with_ymd_and_hms(2025, 10, 15, 18, 0, 0).unwrap();
    let soon = (now + Duration::minutes(45)).to_rfc3339();
    let later = (now + Duration::days(2)).to_rfc3339();
    let body = format!(
        r#"[
            {{"id": 1, "title": "Board Games", "start_time": "{soon}", "location": "Library Cafe",
              "latitude": 51.3760, "longitude": -2.3600, "moods": ["social", "relaxed"],
              "energy_level": "low", "rating": 4.6}},
            {{"id": 2, "title": "Five-a-side", "start_time": "{later}", "location": "Sports Village",
              "latitude": 51.3770, "longitude": -2.3270, "moods": ["energetic"],
              "energy_level": "high", "rating": 4.2}},
            {{"id": 3, "title": "Open Mic", "start_time": "{soon}", "location": "Student Union",
              "moods": ["social"], "energy_level": "medium"}},
            {{"title": "no id, dropped"}}
        ]"#
    );
    let events = parse_event_list(&body).unwrap();
    assert_eq!(events.len(), 3);

    let ctx = FilterContext::at(now);

    let nearby = FilterCriteria::new().with_radius(500.0);
    let ids: Vec<_> = filter_events(&events, &nearby, &ctx)
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec!["1"]);

    let social_soon = FilterCriteria::new()
        .with_mood("social")
        .with_window(TimeWindow::OneHour);
    let cards = browse(&events, &social_soon, &ctx);
    let titles: Vec<_> = cards.iter().map(|c| c.event.title.as_str()).collect();
    assert_eq!(titles, vec!["Board Games", "Open Mic"]);
    assert!(cards[0].distance_m.unwrap() < 50.0);
    assert!(cards[1].distance_m.is_none());

    let rated = FilterCriteria::new().with_min_rating(4.5);
    assert_eq!(filter_events(&events, &rated, &ctx).len(), 1);

    let everything = FilterCriteria::new();
    assert_eq!(filter_events(&events, &everything, &ctx), events);

    let upcoming = FilterCriteria::new().with_bucket(Bucket::Upcoming);
    assert_eq!(filter_events(&events, &upcoming, &ctx).len(), 3);
}
