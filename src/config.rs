//! Configuration Management
//!
//! Optional runtime defaults for dostate. Nothing here is required: every
//! value has a built-in default and can also be overridden per invocation
//! through module parameters.

use crate::digitalocean::client::{ClientOptions, DEFAULT_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default action polling budget in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default seconds between polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// API endpoint override (e.g. a local mock)
    #[serde(default)]
    pub base_url: Option<String>,
    /// List request page size (1..=200)
    #[serde(default)]
    pub page_size: Option<u32>,
    /// Action polling budget in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Seconds between polls
    #[serde(default)]
    pub poll_interval: Option<u64>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dostate").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Get effective base URL (env > config > API default)
    pub fn effective_base_url(&self) -> String {
        std::env::var("DOSTATE_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| crate::digitalocean::client::DEFAULT_BASE_URL.to_string())
    }

    pub fn effective_page_size(&self) -> u32 {
        self.page_size
            .filter(|s| (1..=200).contains(s))
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn effective_timeout(&self) -> u64 {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }

    pub fn effective_poll_interval(&self) -> u64 {
        self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
    }

    /// Client options seeded from this configuration; per-invocation
    /// `client_override_options` splice on top of these.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.effective_base_url(),
            page_size: self.effective_page_size(),
            ..ClientOptions::default()
        }
    }

    /// Polling knobs as durations.
    pub fn polling(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.effective_timeout()),
            Duration::from_secs(self.effective_poll_interval()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::default();
        assert_eq!(config.effective_timeout(), 300);
        assert_eq!(config.effective_poll_interval(), 10);
        assert_eq!(config.effective_page_size(), 100);
    }

    #[test]
    fn out_of_range_page_size_falls_back() {
        let config = Config {
            page_size: Some(500),
            ..Config::default()
        };
        assert_eq!(config.effective_page_size(), 100);
    }
}
