//! Client configuration shared by every Stash interface.
//!
//! Values come from an optional JSON file, then environment overrides. Secrets
//! never live here; sessions are stored by the client that owns them.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::merge::DEFAULT_PAGE_SIZE;
use crate::sync::DEFAULT_AUTO_SYNC_DELAY;
use crate::util::{non_blank, parse_endpoint};
use crate::{Error, Result};

pub const API_URL_ENV: &str = "STASH_API_URL";
pub const AUTO_SYNC_DELAY_ENV: &str = "STASH_AUTO_SYNC_DELAY_MS";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const MAX_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    /// Remote API base URL; without it the client stays in local mode
    pub api_base_url: Option<String>,
    pub auto_sync_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub page_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            auto_sync_delay_ms: u64::try_from(DEFAULT_AUTO_SYNC_DELAY.as_millis())
                .unwrap_or(u64::MAX),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Parse and validate a JSON config document.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {}; using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    /// Apply `STASH_*` environment overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the process environment in production).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = non_blank(lookup(API_URL_ENV)) {
            self.api_base_url = Some(url);
        }
        if let Some(delay) = non_blank(lookup(AUTO_SYNC_DELAY_ENV)) {
            self.auto_sync_delay_ms = delay.parse().map_err(|_| {
                Error::InvalidInput(format!(
                    "{AUTO_SYNC_DELAY_ENV} must be a whole number of milliseconds"
                ))
            })?;
        }
        self.validate()
    }

    /// Normalize optional text and check bounds.
    pub fn validate(mut self) -> Result<Self> {
        if let Some(url) = non_blank(self.api_base_url.take()) {
            let url = parse_endpoint(&url).map_err(|_| {
                Error::InvalidInput(
                    "api_base_url must be http:// or https:// with a host".to_string(),
                )
            })?;
            self.api_base_url = Some(url);
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(Error::InvalidInput(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(self)
    }

    #[must_use]
    pub const fn auto_sync_delay(&self) -> Duration {
        Duration::from_millis(self.auto_sync_delay_ms)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether a remote is configured at all
    #[must_use]
    pub const fn has_remote(&self) -> bool {
        self.api_base_url.is_some()
    }
}
