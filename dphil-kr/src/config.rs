//! Configuration for dphil-kr
//!
//! TOML bootstrap file (`dphil-kr.toml`) with compiled defaults for every
//! key. CLI arguments and environment variables override the file; see
//! `main.rs`.

use dphil_common::config::LoggingConfig;
use dphil_common::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Module name used for config file lookup and health reporting
pub const MODULE_NAME: &str = "dphil-kr";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5790;

/// Records older than this many days are refreshed
pub const DEFAULT_STALENESS_DAYS: i64 = 30;

/// Wikipedia introduction cap, in characters
pub const DEFAULT_SUMMARY_MAX_CHARS: usize = 2000;

pub const DEFAULT_WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";

pub const DEFAULT_USER_AGENT: &str = "DiningPhilosophersApp/1.0 (https://diningphilosophers.ai)";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Folder holding the shared database
    pub root_folder: Option<PathBuf>,
    /// Interface to bind the HTTP server to
    pub bind_address: String,
    /// HTTP server port
    pub port: u16,
    pub logging: LoggingConfig,
    pub knowledge: KnowledgeConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            logging: LoggingConfig::default(),
            knowledge: KnowledgeConfig::default(),
        }
    }
}

/// Knowledge research settings (`[knowledge]` table)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Age after which a complete record is refreshed
    pub staleness_days: i64,
    /// Maximum characters kept from a Wikipedia introduction
    pub summary_max_chars: usize,
    /// MediaWiki API endpoint
    pub wikipedia_api_url: String,
    /// User-Agent sent to external sources
    pub user_agent: String,
    /// Per-request HTTP timeout
    pub http_timeout_secs: u64,
    /// Requested thumbnail width in pixels
    pub thumbnail_size: u32,
    /// Run the stale-record sweep on this interval (hours); disabled when unset
    pub refresh_interval_hours: Option<u64>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            staleness_days: DEFAULT_STALENESS_DAYS,
            summary_max_chars: DEFAULT_SUMMARY_MAX_CHARS,
            wikipedia_api_url: DEFAULT_WIKIPEDIA_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            http_timeout_secs: 30,
            thumbnail_size: 300,
            refresh_interval_hours: None,
        }
    }
}

impl KnowledgeConfig {
    /// Reject values the research pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.staleness_days <= 0 {
            return Err(Error::Config(format!(
                "knowledge.staleness_days must be positive (got {})",
                self.staleness_days
            )));
        }
        if self.summary_max_chars == 0 {
            return Err(Error::Config(
                "knowledge.summary_max_chars must be greater than zero".to_string(),
            ));
        }
        if self.wikipedia_api_url.trim().is_empty() {
            return Err(Error::Config(
                "knowledge.wikipedia_api_url must not be empty".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config(
                "knowledge.http_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.refresh_interval_hours == Some(0) {
            return Err(Error::Config(
                "knowledge.refresh_interval_hours must be greater than zero when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn staleness_threshold(&self) -> chrono::Duration {
        chrono::Duration::days(self.staleness_days)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval_hours
            .map(|hours| Duration::from_secs(hours * 3600))
    }
}
