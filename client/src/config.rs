//! Client sync configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use stocksync_engine::ConflictPolicy;

pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 15;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings the host hands to the sync session.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub auto_sync_enabled: bool,
    pub sync_interval_minutes: u64,
    pub conflict_resolution: ConflictPolicy,
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_key: None,
            auto_sync_enabled: false,
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            conflict_resolution: ConflictPolicy::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("auto_sync_enabled", &self.auto_sync_enabled)
            .field("sync_interval_minutes", &self.sync_interval_minutes)
            .field("conflict_resolution", &self.conflict_resolution)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Base URL and credentials for one remote.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Base URL without a trailing slash
    pub base_url: String,
    pub api_key: String,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl SyncConfig {
    /// Configuration pointing at `base_url` with the given key, everything else default.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base_url: Some(base_url.into()),
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Load configuration from `STOCKSYNC_*` environment variables.
    ///
    /// A `.env` file in the working directory is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self {
            api_base_url: lookup("STOCKSYNC_API_BASE_URL"),
            api_key: lookup("STOCKSYNC_API_KEY"),
            ..Self::default()
        };

        if let Some(raw) = lookup("STOCKSYNC_AUTO_SYNC") {
            config.auto_sync_enabled = parse_bool(&raw).ok_or(ConfigError::InvalidNumber {
                name: "STOCKSYNC_AUTO_SYNC",
                value: raw,
            })?;
        }
        if let Some(raw) = lookup("STOCKSYNC_SYNC_INTERVAL_MINUTES") {
            config.sync_interval_minutes = parse_number("STOCKSYNC_SYNC_INTERVAL_MINUTES", raw)?;
        }
        if let Some(raw) = lookup("STOCKSYNC_CONFLICT_RESOLUTION") {
            config.conflict_resolution = raw.parse().map_err(ConfigError::InvalidPolicy)?;
        }
        if let Some(raw) = lookup("STOCKSYNC_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = parse_number("STOCKSYNC_REQUEST_TIMEOUT_SECS", raw)?;
        }

        config.normalized()
    }

    /// Trim and check every field.
    ///
    /// Blank URLs and keys become `None`; trailing slashes are dropped from
    /// the base URL.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        self.api_base_url = match normalize_text(self.api_base_url) {
            Some(url) => Some(normalize_base_url(url)?),
            None => None,
        };
        self.api_key = normalize_text(self.api_key);

        if self.sync_interval_minutes < 1 {
            return Err(ConfigError::IntervalTooShort);
        }
        if self.request_timeout_secs < 1 {
            return Err(ConfigError::TimeoutTooShort);
        }

        Ok(self)
    }

    /// The remote to sync with, if both a base URL and a key are set.
    pub fn endpoint(&self) -> Option<Endpoint> {
        let base_url = self.api_base_url.as_deref()?.trim();
        let api_key = self.api_key.as_deref()?.trim();
        if base_url.is_empty() || api_key.is_empty() {
            return None;
        }

        Some(Endpoint {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes.max(1) * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_base_url(url: String) -> Result<String, ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(ConfigError::InvalidUrl(url))
    }
}

fn parse_number(name: &'static str, raw: String) -> Result<u64, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { name, value: raw })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
