use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::AppConfig;
use crate::geo::{Coordinates, DEFAULT_ORIGIN};
use crate::models::{EnergyLevel, Event};

const HOUR_MS: f64 = 3_600_000.0;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeWindow {
    #[serde(rename = "now", alias = "immediate")]
    Immediate,
    #[serde(rename = "1hr")]
    OneHour,
    #[serde(rename = "2hr")]
    TwoHours,
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "week")]
    ThisWeek,
}

impl TimeWindow {
    fn max_hours(self) -> Option<f64> {
        match self {
            TimeWindow::Immediate => Some(0.5),
            TimeWindow::OneHour => Some(1.0),
            TimeWindow::TwoHours => Some(2.0),
            TimeWindow::Today => None,
            TimeWindow::ThisWeek => Some(24.0 * 7.0),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "now" | "immediate" => Ok(TimeWindow::Immediate),
            "1hr" | "1h" | "hour" => Ok(TimeWindow::OneHour),
            "2hr" | "2h" => Ok(TimeWindow::TwoHours),
            "today" => Ok(TimeWindow::Today),
            "week" | "this-week" => Ok(TimeWindow::ThisWeek),
            other => Err(format!("unknown time window: {other}")),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Upcoming,
    Past,
}

impl Bucket {
    pub fn of(event: &Event) -> Self {
        if event.is_past() {
            Bucket::Past
        } else {
            Bucket::Upcoming
        }
    }
}

/// Tag naming the constraint a predicate implements.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Query,
    Radius,
    TimeWindow,
    Moods,
    Energy,
    MinRating,
    Bucket,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Criterion::Query => "query",
            Criterion::Radius => "radius",
            Criterion::TimeWindow => "time_window",
            Criterion::Moods => "moods",
            Criterion::Energy => "energy",
            Criterion::MinRating => "min_rating",
            Criterion::Bucket => "bucket",
        };
        f.write_str(label)
    }
}

/// Filter selections made in the UI. Every field is optional and an absent
/// (or empty) field places no constraint on the result.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FilterCriteria {
    pub query: Option<String>,
    pub radius_m: Option<f64>,
    pub window: Option<TimeWindow>,
    pub moods: BTreeSet<String>,
    pub energy: Option<EnergyLevel>,
    pub min_rating: Option<f64>,
    pub bucket: Option<Bucket>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_radius(mut self, meters: f64) -> Self {
        self.radius_m = Some(meters);
        self
    }

    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn with_mood(mut self, mood: impl Into<String>) -> Self {
        self.moods.insert(mood.into());
        self
    }

    pub fn with_energy(mut self, energy: EnergyLevel) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = Some(bucket);
        self
    }

    /// Predicates for the active criteria, in table order.
    pub fn predicates<'a>(&'a self, ctx: &'a FilterContext) -> Vec<Predicate<'a>> {
        PREDICATE_TABLE
            .iter()
            .filter_map(|(criterion, build)| {
                build(self, ctx).map(|test| Predicate {
                    criterion: *criterion,
                    test,
                })
            })
            .collect()
    }

    pub fn matches(&self, event: &Event, ctx: &FilterContext) -> bool {
        all_pass(&self.predicates(ctx), event).is_ok()
    }

    /// Every active criterion the event fails.
    pub fn rejections(&self, event: &Event, ctx: &FilterContext) -> Vec<Criterion> {
        self.predicates(ctx)
            .iter()
            .filter(|predicate| !predicate.check(event))
            .map(|predicate| predicate.criterion)
            .collect()
    }
}

/// Evaluation-time inputs that are not part of the user's selection.
#[derive(Clone, Copy, Debug)]
pub struct FilterContext {
    pub now: DateTime<Utc>,
    pub origin: Coordinates,
    /// Zone used to decide whether an event falls on "today".
    pub timezone: Tz,
}

impl FilterContext {
    pub fn new(now: DateTime<Utc>, origin: Coordinates, timezone: Tz) -> Self {
        Self {
            now,
            origin,
            timezone,
        }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self::new(now, DEFAULT_ORIGIN, chrono_tz::Europe::London)
    }

    pub fn from_config(config: &AppConfig, now: DateTime<Utc>) -> Self {
        Self::new(now, config.origin(), config.tz())
    }
}

type Test<'a> = Box<dyn Fn(&Event) -> bool + 'a>;
type Builder = for<'a> fn(&'a FilterCriteria, &'a FilterContext) -> Option<Test<'a>>;

pub struct Predicate<'a> {
    pub criterion: Criterion,
    test: Test<'a>,
}

impl Predicate<'_> {
    pub fn check(&self, event: &Event) -> bool {
        (self.test)(event)
    }
}

impl fmt::Debug for Predicate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate")
            .field("criterion", &self.criterion)
            .finish_non_exhaustive()
    }
}

// One entry per criterion. A builder returns `None` when its criterion is
// inactive for the given selection.
const PREDICATE_TABLE: [(Criterion, Builder); 7] = [
    (Criterion::Query, query_predicate as Builder),
    (Criterion::Radius, radius_predicate as Builder),
    (Criterion::TimeWindow, window_predicate as Builder),
    (Criterion::Moods, mood_predicate as Builder),
    (Criterion::Energy, energy_predicate as Builder),
    (Criterion::MinRating, rating_predicate as Builder),
    (Criterion::Bucket, bucket_predicate as Builder),
];

fn query_predicate<'a>(criteria: &'a FilterCriteria, _: &'a FilterContext) -> Option<Test<'a>> {
    let needle = criteria.query.as_deref()?.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    Some(Box::new(move |event: &Event| {
        event.title.to_lowercase().contains(&needle)
            || event.location.to_lowercase().contains(&needle)
    }))
}

fn radius_predicate<'a>(criteria: &'a FilterCriteria, ctx: &'a FilterContext) -> Option<Test<'a>> {
    let radius = criteria.radius_m?;
    let origin = ctx.origin;
    Some(Box::new(move |event: &Event| {
        event
            .distance_from(origin)
            .map(|distance| distance <= radius)
            .unwrap_or(false)
    }))
}

fn window_predicate<'a>(criteria: &'a FilterCriteria, ctx: &'a FilterContext) -> Option<Test<'a>> {
    let window = criteria.window?;
    Some(Box::new(move |event: &Event| within_window(event, window, ctx)))
}

fn mood_predicate<'a>(criteria: &'a FilterCriteria, _: &'a FilterContext) -> Option<Test<'a>> {
    if criteria.moods.is_empty() {
        return None;
    }
    let wanted = &criteria.moods;
    Some(Box::new(move |event: &Event| {
        event.moods.iter().any(|mood| wanted.contains(mood))
    }))
}

fn energy_predicate<'a>(criteria: &'a FilterCriteria, _: &'a FilterContext) -> Option<Test<'a>> {
    let energy = criteria.energy?;
    Some(Box::new(move |event: &Event| event.energy_level == Some(energy)))
}

fn rating_predicate<'a>(criteria: &'a FilterCriteria, _: &'a FilterContext) -> Option<Test<'a>> {
    let threshold = criteria.min_rating?;
    Some(Box::new(move |event: &Event| event.rating_or_zero() >= threshold))
}

fn bucket_predicate<'a>(criteria: &'a FilterCriteria, _: &'a FilterContext) -> Option<Test<'a>> {
    let bucket = criteria.bucket?;
    Some(Box::new(move |event: &Event| Bucket::of(event) == bucket))
}

// Events that already started have a negative difference and therefore
// satisfy every hour-bounded window.
fn within_window(event: &Event, window: TimeWindow, ctx: &FilterContext) -> bool {
    let Some(start) = event.start_at(ctx.timezone) else {
        return false;
    };
    match window.max_hours() {
        Some(max_hours) => {
            let diff_hours = (start - ctx.now).num_milliseconds() as f64 / HOUR_MS;
            diff_hours <= max_hours
        }
        None => {
            start.with_timezone(&ctx.timezone).date_naive()
                == ctx.now.with_timezone(&ctx.timezone).date_naive()
        }
    }
}

/// `Ok` when every predicate accepts the event, otherwise the first failing criterion.
pub fn all_pass(predicates: &[Predicate<'_>], event: &Event) -> Result<(), Criterion> {
    match predicates.iter().find(|predicate| !predicate.check(event)) {
        Some(failed) => Err(failed.criterion),
        None => Ok(()),
    }
}

/// Events satisfying every active criterion, in input order.
pub fn filter_events(
    events: &[Event],
    criteria: &FilterCriteria,
    ctx: &FilterContext,
) -> Vec<Event> {
    let predicates = criteria.predicates(ctx);
    events
        .iter()
        .filter(|event| match all_pass(&predicates, event) {
            Ok(()) => true,
            Err(criterion) => {
                trace!(event = %event.id, %criterion, "event filtered out");
                false
            }
        })
        .cloned()
        .collect()
}

/// Splits events into `(upcoming, past)` by status, keeping input order.
pub fn partition_by_bucket(events: &[Event]) -> (Vec<Event>, Vec<Event>) {
    events
        .iter()
        .cloned()
        .partition(|event| Bucket::of(event) == Bucket::Upcoming)
}
