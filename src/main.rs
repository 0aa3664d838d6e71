use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use uninear_lib::config::{AppConfig, ConfigStore};
use uninear_lib::db::Store;
use uninear_lib::filter::{Bucket, Criterion, FilterContext, FilterCriteria, TimeWindow};
use uninear_lib::models::{EnergyLevel, EventDraft, EventStatus, EventUpdate};
use uninear_lib::{browse, calendar_entry, dashboard, source, summarize};

/// Browse, filter and summarize society events.
#[derive(Parser, Debug)]
#[command(name = "uninear", version)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true, env = "UNINEAR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List events matching the given filters
    List {
        #[command(flatten)]
        filters: FilterArgs,
        /// `store`, `api`, or a path to a JSON file
        #[arg(long, default_value = "store")]
        source: String,
        /// Show which filters reject each event instead of the matches
        #[arg(long)]
        explain: bool,
    },
    /// Print aggregate statistics
    Summary {
        #[arg(long, default_value = "store")]
        source: String,
        #[arg(long)]
        past: bool,
        #[arg(long, conflicts_with = "past")]
        upcoming: bool,
    },
    /// Print the organizer dashboard view
    Dashboard {
        #[arg(long, default_value = "store")]
        source: String,
    },
    /// Create an event in the local store
    Create {
        #[arg(long)]
        title: String,
        /// Start time, e.g. 2025-10-15T09:00:00
        #[arg(long)]
        date: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        capacity: u32,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
        #[arg(long)]
        status: Option<EventStatus>,
        #[arg(long = "mood")]
        moods: Vec<String>,
        #[arg(long)]
        energy: Option<EnergyLevel>,
        #[arg(long)]
        organizer: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update fields of a stored event
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        attendees: Option<u32>,
        #[arg(long)]
        capacity: Option<u32>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        status: Option<EventStatus>,
        #[arg(long)]
        rating: Option<f64>,
    },
    /// Delete a stored event
    Delete { id: String },
    /// Print the calendar entry for an event
    Calendar {
        id: String,
        #[arg(long, default_value = "store")]
        source: String,
    },
    /// Fetch events from the API and replace the local store
    Import,
    /// Inspect or change the configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    Show,
    /// Keys: api_url, timezone, origin ("lat,lon"), request_timeout_secs
    Set { key: String, value: String },
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Case-insensitive text matched against title and location
    #[arg(long, short)]
    query: Option<String>,
    /// Maximum distance from the configured origin, in meters
    #[arg(long)]
    radius: Option<f64>,
    /// now, 1hr, 2hr, today or week
    #[arg(long)]
    within: Option<TimeWindow>,
    #[arg(long = "mood")]
    moods: Vec<String>,
    #[arg(long)]
    energy: Option<EnergyLevel>,
    #[arg(long)]
    min_rating: Option<f64>,
    #[arg(long)]
    past: bool,
    #[arg(long, conflicts_with = "past")]
    upcoming: bool,
}

impl FilterArgs {
    fn into_criteria(self) -> FilterCriteria {
        FilterCriteria {
            query: self.query,
            radius_m: self.radius,
            window: self.within,
            moods: self.moods.into_iter().collect(),
            energy: self.energy,
            min_rating: self.min_rating,
            bucket: bucket_flag(self.past, self.upcoming),
        }
    }
}

#[derive(Serialize)]
struct Explanation {
    id: String,
    title: String,
    rejected_by: Vec<Criterion>,
}

fn bucket_flag(past: bool, upcoming: bool) -> Option<Bucket> {
    match (past, upcoming) {
        (true, _) => Some(Bucket::Past),
        (_, true) => Some(Bucket::Upcoming),
        _ => None,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_events(spec: &str, config: &AppConfig) -> Result<Vec<uninear_lib::Event>> {
    let source = source::resolve(spec, config)?;
    let events = source.fetch()?;
    info!(source = %source.name(), count = events.len(), "loaded events");
    Ok(events)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("uninear=info,uninear_lib=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config_store = match cli.config {
        Some(path) => ConfigStore::load_from(path),
        None => ConfigStore::load(),
    };
    let config = config_store.read().with_env_overrides();
    let ctx = FilterContext::from_config(&config, Utc::now());

    match cli.command {
        Command::List {
            filters,
            source,
            explain,
        } => {
            let events = load_events(&source, &config)?;
            let criteria = filters.into_criteria();
            if explain {
                let report: Vec<Explanation> = events
                    .iter()
                    .map(|event| Explanation {
                        id: event.id.clone(),
                        title: event.title.clone(),
                        rejected_by: criteria.rejections(event, &ctx),
                    })
                    .collect();
                print_json(&report)?;
            } else {
                print_json(&browse(&events, &criteria, &ctx))?;
            }
        }
        Command::Summary {
            source,
            past,
            upcoming,
        } => {
            let events = load_events(&source, &config)?;
            let criteria = FilterCriteria {
                bucket: bucket_flag(past, upcoming),
                ..FilterCriteria::default()
            };
            let selected = uninear_lib::filter_events(&events, &criteria, &ctx);
            print_json(&summarize(&selected))?;
        }
        Command::Dashboard { source } => {
            let events = load_events(&source, &config)?;
            print_json(&dashboard(&events, &ctx))?;
        }
        Command::Create {
            title,
            date,
            location,
            capacity,
            price,
            status,
            moods,
            energy,
            organizer,
            description,
        } => {
            let store = Store::open_default().context("failed to open event store")?;
            let event = store.create_event(EventDraft {
                title,
                description,
                start_time: date,
                location,
                capacity,
                price,
                status: status.unwrap_or_default(),
                moods: moods.into_iter().collect(),
                energy_level: energy,
                organizer,
                ..EventDraft::default()
            })?;
            print_json(&event)?;
        }
        Command::Update {
            id,
            title,
            date,
            location,
            attendees,
            capacity,
            price,
            status,
            rating,
        } => {
            let update = EventUpdate {
                title,
                start_time: date,
                location,
                attendees,
                capacity,
                price,
                status,
                rating,
                ..EventUpdate::default()
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update for {id}");
            }
            let store = Store::open_default().context("failed to open event store")?;
            let event = store.update_event(&id, update)?;
            print_json(&event)?;
        }
        Command::Delete { id } => {
            let store = Store::open_default().context("failed to open event store")?;
            store.delete_event(&id)?;
            info!(%id, "event deleted");
        }
        Command::Calendar { id, source } => {
            let events = load_events(&source, &config)?;
            let event = events
                .iter()
                .find(|event| event.id == id)
                .with_context(|| format!("no event with id {id}"))?;
            let entry = calendar_entry(event, ctx.timezone)
                .with_context(|| format!("event {id} has no usable start time"))?;
            print_json(&entry)?;
        }
        Command::Import => {
            let events = load_events("api", &config)?;
            let mut store = Store::open_default().context("failed to open event store")?;
            let count = store.replace_all(&events)?;
            info!(count, "imported events into the local store");
        }
        Command::Config { action } => match action {
            ConfigAction::Show => print_json(&config)?,
            ConfigAction::Set { key, value } => {
                let updated = config_store.update(|config| config.set(&key, &value))?;
                info!(path = ?config_store.path(), "configuration saved");
                print_json(&updated)?;
            }
        },
    }

    Ok(())
}
