//! Configuration file parser for ~/.config/harvest/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted by serde but logged as likely typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchOptions;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file; `None` means `harvest.db` next to the config file.
    pub database_path: Option<PathBuf>,

    /// Concurrent fetches per refresh cycle.
    pub workers: usize,

    pub request_timeout_secs: u64,

    /// Retries for 429, 5xx and truncated responses.
    pub max_retries: u32,

    pub retry_base_delay_ms: u64,

    pub max_feed_bytes: usize,

    pub user_agent: String,

    /// Refresh interval in minutes for `watch`. 0 = manual refresh only.
    pub refresh_interval_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            database_path: None,
            workers: 4,
            request_timeout_secs: fetch.timeout.as_secs(),
            max_retries: fetch.max_retries,
            retry_base_delay_ms: fetch.retry_base_delay.as_millis() as u64,
            max_feed_bytes: fetch.max_body_bytes,
            user_agent: fetch.user_agent,
            refresh_interval_minutes: 0,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "database_path",
        "workers",
        "request_timeout_secs",
        "max_retries",
        "retry_base_delay_ms",
        "max_feed_bytes",
        "user_agent",
        "refresh_interval_minutes",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML or wrong value types → `Err(ConfigError::Parse)`
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::parse(&content)?;
        tracing::info!(path = %path.display(), workers = config.workers, "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::from(self)
    }

    /// The configured database, or `harvest.db` beside `config_path`.
    pub fn database_path_for(&self, config_path: &Path) -> PathBuf {
        if let Some(path) = &self.database_path {
            return path.clone();
        }
        config_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("harvest.db")
    }
}

impl From<&Config> for FetchOptions {
    fn from(config: &Config) -> Self {
        FetchOptions {
            timeout: Duration::from_secs(config.request_timeout_secs),
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_body_bytes: config.max_feed_bytes,
            user_agent: config.user_agent.clone(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
