use std::path::Path;

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{EnergyLevel, Event, EventDraft, EventStatus, EventUpdate, ValidationError};
use crate::utils;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database directory error: {0}")]
    Io(#[from] std::io::Error),
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("invalid event: {0}")]
    Invalid(#[from] ValidationError),
    #[error("event not found: {0}")]
    NotFound(String),
    #[error("event already exists: {0}")]
    Duplicate(String),
    #[error("event {0} is past and can no longer be changed")]
    Immutable(String),
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&utils::database_path())
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        utils::ensure_parent(path)?;
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        store.seed_if_empty()?;
        Ok(store)
    }

    /// Empty, unseeded store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS events(
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                payload TEXT NOT NULL,
                created_at_utc TEXT NOT NULL,
                updated_at_utc TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    pub fn seed_if_empty(&self) -> Result<(), StoreError> {
        if self.count()? > 0 {
            return Ok(());
        }

        let samples = sample_events();
        info!("seeding event store with {} sample events", samples.len());
        for event in &samples {
            self.upsert_event(event)?;
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn upsert_event(&self, event: &Event) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(event)?;
        self.conn.execute(
            "INSERT INTO events (id, payload, created_at_utc, updated_at_utc)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET
               payload = excluded.payload,
               updated_at_utc = excluded.updated_at_utc",
            params![event.id, payload, now],
        )?;
        Ok(())
    }

    pub fn create_event(&self, draft: EventDraft) -> Result<Event, StoreError> {
        draft.validate()?;
        let id = event_id(&draft.title, &draft.start_time, &draft.location);
        if self.find_event(&id)?.is_some() {
            return Err(StoreError::Duplicate(id));
        }
        let event = draft.into_event(id);
        self.upsert_event(&event)?;
        info!(id = %event.id, title = %event.title, "event created");
        Ok(event)
    }

    pub fn update_event(&self, id: &str, update: EventUpdate) -> Result<Event, StoreError> {
        let mut event = self.get_event(id)?;
        if event.is_past() {
            warn!(id = %id, "refusing to edit past event");
            return Err(StoreError::Immutable(id.to_string()));
        }
        update.validate()?;
        update.apply(&mut event);
        self.upsert_event(&event)?;
        Ok(event)
    }

    pub fn delete_event(&self, id: &str) -> Result<(), StoreError> {
        let event = self.get_event(id)?;
        if event.is_past() {
            warn!(id = %id, "refusing to delete past event");
            return Err(StoreError::Immutable(id.to_string()));
        }
        self.conn.execute("DELETE FROM events WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn find_event(&self, id: &str) -> Result<Option<Event>, StoreError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM events WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub fn get_event(&self, id: &str) -> Result<Event, StoreError> {
        self.find_event(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// All stored events in insertion order. Rows whose payload no longer
    /// decodes are skipped.
    pub fn list_events(&self) -> Result<Vec<Event>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, payload FROM events ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, payload) = row?;
            match serde_json::from_str::<Event>(&payload) {
                Ok(event) => out.push(event),
                Err(err) => warn!(id = %id, "skipping undecodable stored event: {err}"),
            }
        }
        Ok(out)
    }

    /// Replaces the whole catalogue with `events`, e.g. after fetching from the API.
    /// Returns the number of rows stored; entries sharing an id collapse into
    /// the last one.
    pub fn replace_all(&mut self, events: &[Event]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM events", [])?;
        let now = Utc::now().to_rfc3339();
        for event in events {
            let payload = serde_json::to_string(event)?;
            tx.execute(
                "INSERT INTO events (id, payload, created_at_utc, updated_at_utc)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
                params![event.id, payload, now],
            )?;
        }
        tx.commit()?;

        let stored = self.count()?;
        if stored < events.len() {
            warn!(
                received = events.len(),
                stored,
                "duplicate event ids collapsed during import"
            );
        }
        Ok(stored)
    }
}

/// Stable identifier derived from the fields an organizer cannot create twice.
pub fn event_id(title: &str, start: &str, location: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(start.trim().as_bytes());
    hasher.update(b"|");
    hasher.update(location.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn sample_events() -> Vec<Event> {
    let now = Utc::now();
    vec![
        sample_event(
            "Annual Tech Hackathon",
            "Engineering Hub",
            now + Duration::days(3),
            (142, 200),
            EventStatus::Published,
            15.0,
            &["coding", "focused"],
            EnergyLevel::High,
        ),
        sample_event(
            "Industry Panel Night",
            "Main Auditorium",
            now + Duration::days(10),
            (89, 150),
            EventStatus::Draft,
            0.0,
            &["networking"],
            EnergyLevel::Medium,
        ),
        sample_event(
            "Freshers Mixer",
            "Student Union Bar",
            now + Duration::days(20),
            (45, 100),
            EventStatus::Scheduled,
            5.0,
            &["social", "drinks"],
            EnergyLevel::High,
        ),
    ]
}

#[allow(clippy::too_many_arguments)]
fn sample_event(
    title: &str,
    location: &str,
    start: chrono::DateTime<Utc>,
    (attendees, capacity): (u32, u32),
    status: EventStatus,
    price: f64,
    moods: &[&str],
    energy: EnergyLevel,
) -> Event {
    let start_iso = start.to_rfc3339();
    let mut event = EventDraft {
        title: title.to_string(),
        start_time: start_iso.clone(),
        location: location.to_string(),
        capacity,
        price,
        status,
        moods: moods.iter().map(|m| m.to_string()).collect(),
        energy_level: Some(energy),
        organizer: Some("Tech Society".to_string()),
        ..Default::default()
    }
    .into_event(event_id(title, &start_iso, location));
    event.attendees = attendees;
    event
}
