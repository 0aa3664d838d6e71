use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{self, Coordinates};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EventStatus {
    #[default]
    #[serde(alias = "draft")]
    Draft,
    #[serde(alias = "published")]
    Published,
    #[serde(alias = "scheduled")]
    Scheduled,
    #[serde(alias = "past")]
    Past,
}

impl EventStatus {
    pub fn is_past(self) -> bool {
        matches!(self, EventStatus::Past)
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(EventStatus::Draft),
            "published" => Ok(EventStatus::Published),
            "scheduled" => Ok(EventStatus::Scheduled),
            "past" => Ok(EventStatus::Past),
            other => Err(format!("unknown event status: {other}")),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventStatus::Draft => "Draft",
            EventStatus::Published => "Published",
            EventStatus::Scheduled => "Scheduled",
            EventStatus::Past => "Past",
        };
        f.write_str(label)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    #[serde(alias = "Low", alias = "LOW")]
    Low,
    #[serde(alias = "Medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "High", alias = "HIGH")]
    High,
}

impl FromStr for EnergyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(EnergyLevel::Low),
            "medium" => Ok(EnergyLevel::Medium),
            "high" => Ok(EnergyLevel::High),
            other => Err(format!("unknown energy level: {other}")),
        }
    }
}

/// A single society event.
///
/// Optional fields carry their own defaults: a missing `price` counts as 0,
/// a missing `rating` counts as 0 for the rating filter, and missing
/// coordinates mean the distance to the event is unknown.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "EventWire")]
pub struct Event {
    pub id: String,
    pub title: String,
    /// Start timestamp as received. Parsed lazily by [`Event::start_at`] so a
    /// malformed value never aborts loading the rest of a list.
    #[serde(rename = "start_time")]
    pub start: String,
    pub location: String,
    pub attendees: u32,
    pub capacity: u32,
    pub status: EventStatus,
    pub price: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub moods: BTreeSet<String>,
    pub energy_level: Option<EnergyLevel>,
    pub length: Option<String>,
    pub organizer: Option<String>,
    pub rating: Option<f64>,
    pub friends_attending: Vec<String>,
    pub description: Option<String>,
}

impl Event {
    pub fn price_or_zero(&self) -> f64 {
        self.price.unwrap_or(0.0)
    }

    pub fn rating_or_zero(&self) -> f64 {
        self.rating.unwrap_or(0.0)
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates::new(latitude, longitude)),
            _ => None,
        }
    }

    /// Great-circle distance in meters, `None` when the event has no coordinates.
    pub fn distance_from(&self, origin: Coordinates) -> Option<f64> {
        self.coordinates().map(|coords| geo::haversine_m(origin, coords))
    }

    pub fn start_at(&self, tz: Tz) -> Option<DateTime<Utc>> {
        parse_start(&self.start, tz)
    }

    pub fn is_past(&self) -> bool {
        self.status.is_past()
    }
}

/// Parses an event start timestamp.
///
/// RFC 3339 values carry their own offset; naive date-times and bare dates
/// are read as wall-clock time in `tz` (bare dates at midnight). A wall-clock
/// time skipped by a spring-forward transition resolves to the instant the
/// clocks show it an hour later, the way a phone calendar does.
pub fn parse_start(text: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return localize(naive, tz);
        }
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    localize(date.and_hms_opt(0, 0, 0)?, tz)
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(dt, _) => Some(dt.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}

// Shape accepted from the events endpoint and from stored payloads. The web
// and mobile clients disagree on several field names, so aliases are
// collapsed here.
#[derive(Deserialize)]
struct EventWire {
    id: WireId,
    title: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    locations: Option<WireLocation>,
    #[serde(default)]
    attendees: Option<u32>,
    #[serde(default)]
    capacity: Option<u32>,
    #[serde(default)]
    status: Option<EventStatus>,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    moods: Option<BTreeSet<String>>,
    #[serde(default)]
    mood_tags: Option<BTreeSet<String>>,
    #[serde(default)]
    energy_level: Option<EnergyLevel>,
    #[serde(default)]
    length: Option<String>,
    #[serde(default)]
    organizer: Option<String>,
    #[serde(default)]
    organiser: Option<String>,
    #[serde(default)]
    organiser_id: Option<String>,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default)]
    friends_attending: Option<Vec<String>>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

#[derive(Deserialize)]
struct WireLocation {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
}

impl From<EventWire> for Event {
    fn from(wire: EventWire) -> Self {
        let id = match wire.id {
            WireId::Text(id) => id,
            WireId::Number(id) => id.to_string(),
        };
        let (joined_name, joined_lat, joined_lon) = match wire.locations {
            Some(loc) => (loc.name, loc.latitude, loc.longitude),
            None => (None, None, None),
        };

        Event {
            id,
            title: wire.title,
            start: wire.start_time.or(wire.date).unwrap_or_default(),
            location: wire.location.or(joined_name).unwrap_or_default(),
            attendees: wire.attendees.unwrap_or(0),
            capacity: wire.capacity.unwrap_or(0),
            status: wire.status.unwrap_or_default(),
            price: wire.price,
            latitude: wire.latitude.or(joined_lat),
            longitude: wire.longitude.or(joined_lon),
            moods: wire.moods.or(wire.mood_tags).unwrap_or_default(),
            energy_level: wire.energy_level,
            length: wire.length,
            organizer: wire.organizer.or(wire.organiser).or(wire.organiser_id),
            rating: wire.rating,
            friends_attending: wire.friends_attending.unwrap_or_default(),
            description: wire.description,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("start time is not a valid date: {0}")]
    MalformedStart(String),
    #[error("capacity must be positive")]
    ZeroCapacity,
    #[error("price must not be negative: {0}")]
    NegativePrice(f64),
    #[error("rating must be between 0 and 5: {0}")]
    RatingOutOfRange(f64),
}

/// Payload for creating an event from the organizer screen.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "date")]
    pub start_time: String,
    pub location: String,
    pub capacity: u32,
    pub price: f64,
    #[serde(default)]
    pub status: EventStatus,
    #[serde(default, alias = "mood_tags")]
    pub moods: BTreeSet<String>,
    #[serde(default)]
    pub energy_level: Option<EnergyLevel>,
    #[serde(default, alias = "organiser_id")]
    pub organizer: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

impl EventDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        check_start(&self.start_time)?;
        check_capacity(self.capacity)?;
        check_price(self.price)?;
        if let Some(rating) = self.rating {
            check_rating(rating)?;
        }
        Ok(())
    }

    pub fn into_event(self, id: String) -> Event {
        Event {
            id,
            title: self.title.trim().to_string(),
            start: self.start_time,
            location: self.location,
            attendees: 0,
            capacity: self.capacity,
            status: self.status,
            price: Some(self.price),
            latitude: self.latitude,
            longitude: self.longitude,
            moods: self.moods,
            energy_level: self.energy_level,
            length: self.length,
            organizer: self.organizer,
            rating: self.rating,
            friends_attending: Vec::new(),
            description: self.description,
        }
    }
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "date")]
    pub start_time: Option<String>,
    pub location: Option<String>,
    pub attendees: Option<u32>,
    pub capacity: Option<u32>,
    pub price: Option<f64>,
    pub status: Option<EventStatus>,
    #[serde(alias = "mood_tags")]
    pub moods: Option<BTreeSet<String>>,
    pub energy_level: Option<EnergyLevel>,
    pub rating: Option<f64>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        self == &EventUpdate::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::EmptyTitle);
            }
        }
        if let Some(start) = &self.start_time {
            check_start(start)?;
        }
        if let Some(capacity) = self.capacity {
            check_capacity(capacity)?;
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        if let Some(rating) = self.rating {
            check_rating(rating)?;
        }
        Ok(())
    }

    pub fn apply(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            event.description = Some(description);
        }
        if let Some(start) = self.start_time {
            event.start = start;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(attendees) = self.attendees {
            event.attendees = attendees;
        }
        if let Some(capacity) = self.capacity {
            event.capacity = capacity;
        }
        if let Some(price) = self.price {
            event.price = Some(price);
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(moods) = self.moods {
            event.moods = moods;
        }
        if let Some(energy) = self.energy_level {
            event.energy_level = Some(energy);
        }
        if let Some(rating) = self.rating {
            event.rating = Some(rating);
        }
    }
}

fn check_start(start: &str) -> Result<(), ValidationError> {
    match parse_start(start, chrono_tz::UTC) {
        Some(_) => Ok(()),
        None => Err(ValidationError::MalformedStart(start.to_string())),
    }
}

fn check_capacity(capacity: u32) -> Result<(), ValidationError> {
    if capacity == 0 {
        Err(ValidationError::ZeroCapacity)
    } else {
        Ok(())
    }
}

fn check_price(price: f64) -> Result<(), ValidationError> {
    if price < 0.0 || price.is_nan() {
        Err(ValidationError::NegativePrice(price))
    } else {
        Ok(())
    }
}

fn check_rating(rating: f64) -> Result<(), ValidationError> {
    if (0.0..=5.0).contains(&rating) {
        Ok(())
    } else {
        Err(ValidationError::RatingOutOfRange(rating))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use serde_json::json;

    #[test]
    fn decodes_mobile_payload_with_defaults() {
        let event: Event = serde_json::from_value(json!({
            "id": 7,
            "title": "Board Games Night",
            "start_time": "2025-10-15T19:00:00Z",
            "location": "Library Cafe",
            "moods": ["social", "relaxed"],
            "energy_level": "low",
            "rating": 4.6
        }))
        .unwrap();

        assert_eq!(event.id, "7");
        assert_eq!(event.status, EventStatus::Draft);
        assert_eq!(event.attendees, 0);
        assert_eq!(event.price_or_zero(), 0.0);
        assert_eq!(event.energy_level, Some(EnergyLevel::Low));
        assert!(event.moods.contains("social"));
        assert!(event.coordinates().is_none());
    }

    #[test]
    fn accepts_dashboard_aliases() {
        let event: Event = serde_json::from_value(json!({
            "id": "evt-1",
            "title": "Annual Tech Hackathon",
            "date": "2025-10-15",
            "locations": { "name": "Engineering Hub", "latitude": 51.38, "longitude": -2.33 },
            "mood_tags": ["Coding"],
            "organiser_id": "tech-soc",
            "status": "Published",
            "energy_level": "High"
        }))
        .unwrap();

        assert_eq!(event.start, "2025-10-15");
        assert_eq!(event.location, "Engineering Hub");
        assert!(event.coordinates().is_some());
        assert_eq!(event.organizer.as_deref(), Some("tech-soc"));
        assert_eq!(event.status, EventStatus::Published);
        assert_eq!(event.energy_level, Some(EnergyLevel::High));
    }

    #[test]
    fn serialized_event_reads_back() {
        let event: Event = serde_json::from_value(json!({
            "id": "a",
            "title": "Quiz",
            "start_time": "2025-11-01T20:00:00Z",
            "price": 3.5,
            "status": "Past"
        }))
        .unwrap();
        let text = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn parses_supported_start_formats() {
        let london = chrono_tz::Europe::London;
        let rfc = parse_start("2025-10-15T09:00:00+01:00", london).unwrap();
        assert_eq!(rfc.hour(), 8);

        let naive = parse_start("2025-10-15T09:00:00", london).unwrap();
        assert_eq!(naive, rfc);

        let date_only = parse_start("2025-10-15", chrono_tz::UTC).unwrap();
        assert_eq!(date_only.hour(), 0);

        assert!(parse_start("not-a-date", london).is_none());
        assert!(parse_start("", london).is_none());
    }

    #[test]
    fn spring_forward_gap_resolves_to_a_real_instant() {
        // London skips 01:00-02:00 on 2026-03-29; 01:30 is read as 02:30 BST.
        let london = chrono_tz::Europe::London;
        let start = parse_start("2026-03-29T01:30:00", london).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 29, 1, 30, 0).unwrap());

        let draft = EventDraft {
            title: "Clocks Change Social".into(),
            start_time: "2026-03-29T01:30:00".into(),
            location: "Student Union Bar".into(),
            capacity: 50,
            price: 0.0,
            ..Default::default()
        };
        assert_eq!(draft.validate(), Ok(()));
        assert!(draft.into_event("gap".into()).start_at(london).is_some());
    }

    #[test]
    fn draft_validation_rejects_bad_payloads() {
        let draft = EventDraft {
            title: "Test Event".into(),
            start_time: "2025-10-15T09:00:00".into(),
            location: "Test Location".into(),
            capacity: 100,
            price: 10.0,
            ..Default::default()
        };
        assert_eq!(draft.validate(), Ok(()));
        assert_eq!(draft.status, EventStatus::Draft);

        let bad_date = EventDraft {
            start_time: "not-a-date".into(),
            ..draft.clone()
        };
        assert!(matches!(
            bad_date.validate(),
            Err(ValidationError::MalformedStart(_))
        ));

        let no_room = EventDraft {
            capacity: 0,
            ..draft.clone()
        };
        assert_eq!(no_room.validate(), Err(ValidationError::ZeroCapacity));

        let negative = EventDraft {
            price: -1.0,
            ..draft
        };
        assert_eq!(negative.validate(), Err(ValidationError::NegativePrice(-1.0)));
    }

    #[test]
    fn draft_requires_core_fields_on_the_wire() {
        let err = serde_json::from_value::<EventDraft>(json!({ "title": "Test Event" }));
        assert!(err.is_err());
    }

    #[test]
    fn update_applies_only_present_fields() {
        let mut event = EventDraft {
            title: "Panel".into(),
            start_time: "2025-10-22".into(),
            location: "Main Auditorium".into(),
            capacity: 150,
            price: 0.0,
            ..Default::default()
        }
        .into_event("p1".into());

        let update: EventUpdate =
            serde_json::from_value(json!({ "title": "Industry Panel Night" })).unwrap();
        assert!(!update.is_empty());
        assert_eq!(update.location, None);
        update.apply(&mut event);

        assert_eq!(event.title, "Industry Panel Night");
        assert_eq!(event.location, "Main Auditorium");
        assert_eq!(event.capacity, 150);
        assert!(EventUpdate::default().is_empty());
    }

    #[test]
    fn draft_rating_is_checked_and_carried() {
        let draft = EventDraft {
            title: "Quiz".into(),
            start_time: "2025-10-15".into(),
            location: "Bar".into(),
            capacity: 40,
            price: 2.0,
            rating: Some(6.0),
            ..Default::default()
        };
        assert_eq!(draft.validate(), Err(ValidationError::RatingOutOfRange(6.0)));

        let rated = EventDraft {
            rating: Some(4.2),
            ..draft
        };
        assert_eq!(rated.validate(), Ok(()));
        assert_eq!(rated.into_event("q".into()).rating, Some(4.2));
    }

    #[test]
    fn update_rejects_out_of_range_rating() {
        let update = EventUpdate {
            rating: Some(5.5),
            ..Default::default()
        };
        assert_eq!(update.validate(), Err(ValidationError::RatingOutOfRange(5.5)));
    }

    #[test]
    fn status_and_energy_parse_case_insensitively() {
        assert_eq!("PUBLISHED".parse::<EventStatus>(), Ok(EventStatus::Published));
        assert_eq!("Medium".parse::<EnergyLevel>(), Ok(EnergyLevel::Medium));
        assert!("loud".parse::<EnergyLevel>().is_err());
    }
}
