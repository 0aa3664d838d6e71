use std::{fs, path::PathBuf};

use anyhow::Context;

use crate::config::AppConfig;
use crate::db::Store;
use crate::fetch::{self, ApiClient};
use crate::models::Event;

/// Somewhere a collection of events can be loaded from.
pub trait EventSource {
    fn name(&self) -> String;
    fn fetch(&self) -> anyhow::Result<Vec<Event>>;
}

/// The remote events endpoint.
pub struct ApiSource {
    client: ApiClient,
}

impl ApiSource {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: ApiClient::from_config(config)?,
        })
    }
}

impl EventSource for ApiSource {
    fn name(&self) -> String {
        format!("api ({})", self.client.url())
    }

    fn fetch(&self) -> anyhow::Result<Vec<Event>> {
        self.client
            .fetch_events()
            .with_context(|| format!("failed to fetch events from {}", self.client.url()))
    }
}

/// The local SQLite catalogue.
pub struct StoreSource {
    path: Option<PathBuf>,
}

impl StoreSource {
    pub fn default_location() -> Self {
        Self { path: None }
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }
}

impl EventSource for StoreSource {
    fn name(&self) -> String {
        match &self.path {
            Some(path) => format!("store ({})", path.display()),
            None => "store".to_string(),
        }
    }

    fn fetch(&self) -> anyhow::Result<Vec<Event>> {
        let store = match &self.path {
            Some(path) => Store::open(path),
            None => Store::open_default(),
        }
        .context("failed to open event store")?;
        Ok(store.list_events()?)
    }
}

/// A JSON file holding the same array the endpoint returns.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl EventSource for FileSource {
    fn name(&self) -> String {
        format!("file ({})", self.path.display())
    }

    fn fetch(&self) -> anyhow::Result<Vec<Event>> {
        let body = fs::read_to_string(&self.path)
            .with_context(|| format!("unable to read {}", self.path.display()))?;
        fetch::parse_event_list(&body)
            .with_context(|| format!("unable to parse {}", self.path.display()))
    }
}

/// Resolves a `--source` argument: `store`, `api`, or a path to a JSON file.
pub fn resolve(spec: &str, config: &AppConfig) -> anyhow::Result<Box<dyn EventSource>> {
    match spec {
        "store" => Ok(Box::new(StoreSource::default_location())),
        "api" => Ok(Box::new(ApiSource::from_config(config)?)),
        path => Ok(Box::new(FileSource::new(PathBuf::from(path)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_source_reads_event_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.json");
        fs::write(
            &path,
            r#"[{"id": 1, "title": "Test Event", "location": "Hall"}]"#,
        )
        .unwrap();

        let source = resolve(path.to_str().unwrap(), &AppConfig::default()).unwrap();
        assert!(source.name().starts_with("file"));
        let events = source.fetch().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Test Event");
    }

    #[test]
    fn missing_file_reports_the_path() {
        let source = FileSource::new(PathBuf::from("/definitely/not/here.json"));
        let err = source.fetch().unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.json"));
    }

    #[test]
    fn store_source_lists_seeded_events() {
        let dir = tempfile::tempdir().unwrap();
        let source = StoreSource::at(dir.path().join("events.sqlite"));
        assert_eq!(source.fetch().unwrap().len(), 3);
    }
}
