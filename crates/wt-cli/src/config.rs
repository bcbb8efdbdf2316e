//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Base URL of the remote collector.
    pub collector_url: String,
    /// Seconds between accrual checkpoints for the focused domain.
    pub tick_interval_secs: u64,
    /// Seconds without activity before the user counts as idle.
    pub idle_threshold_secs: u64,
    /// Seconds between idle polls. Also how often settings are re-read.
    pub idle_poll_interval_secs: u64,
    /// Seconds between sync attempts.
    pub sync_interval_secs: u64,
    /// Upper bound on one delivery request.
    pub delivery_timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("collector_url", &self.collector_url)
            .field("tick_interval_secs", &self.tick_interval_secs)
            .field("idle_threshold_secs", &self.idle_threshold_secs)
            .field("idle_poll_interval_secs", &self.idle_poll_interval_secs)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .field("delivery_timeout_secs", &self.delivery_timeout_secs)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("wt.db"),
            collector_url: "http://localhost:4000".to_string(),
            tick_interval_secs: 1,
            idle_threshold_secs: 300,
            idle_poll_interval_secs: 15,
            sync_interval_secs: 600,
            delivery_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (WT_*)
        figment = figment.merge(Env::prefixed("WT_"));

        figment.extract()
    }

    /// Interval timings, with zero values raised to one second.
    pub fn timings(&self) -> Timings {
        let secs = |value: u64| Duration::from_secs(value.max(1));
        Timings {
            tick: secs(self.tick_interval_secs),
            idle_threshold: secs(self.idle_threshold_secs),
            idle_poll: secs(self.idle_poll_interval_secs),
            sync: secs(self.sync_interval_secs),
            delivery_timeout: secs(self.delivery_timeout_secs),
        }
    }
}

/// Daemon timings derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub tick: Duration,
    pub idle_threshold: Duration,
    pub idle_poll: Duration,
    pub sync: Duration,
    pub delivery_timeout: Duration,
}

/// Returns the platform-specific config directory for wt.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("wt"))
}

/// Returns the platform-specific data directory for wt.
///
/// On Linux: `~/.local/share/wt`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("wt"))
}
