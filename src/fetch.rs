use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::models::Event;

const USER_AGENT: &str = "UniNear/0.1";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http error: {0}")]
    Http(String),
    #[error("events endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("parse error: {0}")]
    Parse(String),
}

/// One-shot client for the events endpoint. Failures are returned to the
/// caller, who decides whether to ask again.
pub struct ApiClient {
    url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| FetchError::Http(err.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        Self::new(
            config.api_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fetch_events(&self) -> Result<Vec<Event>, FetchError> {
        info!(url = %self.url, "fetching events");
        let response = self
            .client
            .get(self.url.as_str())
            .send()
            .map_err(|err| FetchError::Http(err.to_string()))?;

        let status = response.status();
        debug!(status = status.as_u16(), "events response");
        let body = response
            .text()
            .map_err(|err| FetchError::Http(err.to_string()))?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        parse_event_list(&body)
    }
}

/// Decodes a JSON array of events. Entries that are not valid events are
/// skipped so one bad record does not hide the rest of the list.
pub fn parse_event_list(body: &str) -> Result<Vec<Event>, FetchError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| FetchError::Parse(err.to_string()))?;
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(FetchError::Parse(format!(
                "expected an array of events, got {}",
                json_kind(&other)
            )))
        }
    };

    let total = items.len();
    let mut events = Vec::with_capacity(total);
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<Event>(item) {
            Ok(event) => events.push(event),
            Err(err) => warn!(index, "skipping malformed event: {err}"),
        }
    }
    if events.len() < total {
        info!(kept = events.len(), total, "some events were skipped");
    }
    Ok(events)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
