//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/habitsync/config.toml)
//! 3. Environment variables (HABITSYNC_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "HABITSYNC";

/// Default snapshot cooldown, in hours
pub const DEFAULT_SNAPSHOT_INTERVAL_HOURS: u64 = 24;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local state (pending queue, checkpoint, collections)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Account whose remote event log this device syncs against
    #[serde(default)]
    pub account_id: Option<String>,

    /// Shared directory acting as the remote store
    #[serde(default)]
    pub remote_dir: Option<PathBuf>,

    /// Whether sync is enabled
    #[serde(default)]
    pub sync_enabled: bool,

    /// Minimum hours between two compactions from this device
    #[serde(default = "default_snapshot_interval_hours")]
    pub snapshot_interval_hours: u64,

    /// Log file used when HABITSYNC_LOG is set
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            account_id: None,
            remote_dir: None,
            sync_enabled: false,
            snapshot_interval_hours: DEFAULT_SNAPSHOT_INTERVAL_HOURS,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (HABITSYNC_DATA_DIR, HABITSYNC_ACCOUNT_ID, ...)
    /// 2. Config file (~/.config/habitsync/config.toml or HABITSYNC_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Empty string clears the optional values
        if let Ok(val) = std::env::var(format!("{}_ACCOUNT_ID", ENV_PREFIX)) {
            self.account_id = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_REMOTE_DIR", ENV_PREFIX)) {
            self.remote_dir = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_ENABLED", ENV_PREFIX)) {
            self.sync_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = std::env::var(format!("{}_SNAPSHOT_INTERVAL_HOURS", ENV_PREFIX)) {
            match val.parse() {
                Ok(hours) => self.snapshot_interval_hours = hours,
                Err(_) => tracing::warn!(
                    "Ignoring invalid {}_SNAPSHOT_INTERVAL_HOURS value {:?}",
                    ENV_PREFIX,
                    val
                ),
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with HABITSYNC_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("habitsync")
            .join("config.toml")
    }

    /// Directory holding the local key-value state
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Snapshot cooldown as a duration
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_hours.saturating_mul(60 * 60))
    }

    /// Account id, if sync is enabled and one is configured
    pub fn sync_account(&self) -> Option<&str> {
        if !self.sync_enabled {
            return None;
        }
        self.account_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("habitsync")
}

fn default_snapshot_interval_hours() -> u64 {
    DEFAULT_SNAPSHOT_INTERVAL_HOURS
}
