use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::geo::{Coordinates, DEFAULT_ORIGIN};
use crate::utils;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/events";
pub const DEFAULT_TIMEZONE: &str = "Europe/London";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config format error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    pub timezone: String,
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            origin_latitude: DEFAULT_ORIGIN.latitude,
            origin_longitude: DEFAULT_ORIGIN.longitude,
            timezone: DEFAULT_TIMEZONE.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    pub fn origin(&self) -> Coordinates {
        Coordinates::new(self.origin_latitude, self.origin_longitude)
    }

    /// Configured zone, falling back to London when the name is unknown.
    pub fn tz(&self) -> Tz {
        self.timezone.parse::<Tz>().unwrap_or_else(|_| {
            warn!("unknown timezone {:?}, using {DEFAULT_TIMEZONE}", self.timezone);
            chrono_tz::Europe::London
        })
    }

    /// Applies `UNINEAR_API_URL`, `UNINEAR_TIMEZONE` and `UNINEAR_ORIGIN` on top
    /// of the file values.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("UNINEAR_API_URL") {
            self.api_url = url;
        }
        if let Some(tz) = lookup("UNINEAR_TIMEZONE") {
            self.timezone = tz;
        }
        if let Some(origin) = lookup("UNINEAR_ORIGIN") {
            match Coordinates::parse_pair(&origin) {
                Some(coords) => {
                    self.origin_latitude = coords.latitude;
                    self.origin_longitude = coords.longitude;
                }
                None => warn!("ignoring malformed UNINEAR_ORIGIN {origin:?}"),
            }
        }
        self
    }

    /// Sets a single field from its textual form, as used by `config set`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "api_url" => self.api_url = value.trim().to_string(),
            "timezone" => {
                value.trim().parse::<Tz>().map_err(|_| invalid())?;
                self.timezone = value.trim().to_string();
            }
            "origin" => {
                let coords = Coordinates::parse_pair(value).ok_or_else(invalid)?;
                self.origin_latitude = coords.latitude;
                self.origin_longitude = coords.longitude;
            }
            "request_timeout_secs" => {
                self.request_timeout_secs = value.trim().parse().map_err(|_| invalid())?;
            }
            _ => return Err(invalid()),
        }
        Ok(())
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: AppConfig,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = read_config(&path).unwrap_or_else(|err| {
            warn!("failed to read config {:?}: {err}", path);
            AppConfig::default()
        });
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> AppConfig {
        self.data.clone()
    }

    pub fn update<F>(&mut self, transform: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig) -> Result<(), ConfigError>,
    {
        let mut next = self.data.clone();
        transform(&mut next)?;
        write_config(&self.path, &next)?;
        self.data = next;
        Ok(self.data.clone())
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        debug!("no config at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    utils::ensure_parent(path)?;
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}
