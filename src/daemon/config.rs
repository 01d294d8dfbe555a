use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "config.toml";

/// Application configuration, read from `config.toml` in the application
/// directory. Every field has a default, so a missing or partial file still
/// yields a working tracker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Sync target. Absent section means the daemon runs purely local.
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub tracker: TimingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    #[serde(default = "default_username")]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Seconds without input before the user counts as idle.
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_secs: u32,
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            idle_threshold_secs: default_idle_threshold(),
            autosave_interval_secs: default_autosave_interval(),
            retry_interval_secs: default_retry_interval(),
        }
    }
}

fn default_username() -> String {
    "user1".into()
}

fn default_idle_threshold() -> u32 {
    10
}

fn default_autosave_interval() -> u64 {
    60
}

fn default_retry_interval() -> u64 {
    300
}

impl TrackerConfig {
    pub fn load_or_default(app_dir: &Path) -> Result<Self> {
        let path = app_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Can't read configuration at {path:?}"))?;
        toml::from_str(&contents).with_context(|| format!("Can't parse configuration at {path:?}"))
    }
}
