//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.evaldash.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".evaldash.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Dashboard settings.
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Owner whose evaluations are shown when `--user` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// Evaluation store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON store file.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How long to wait for a store call before giving up.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("evaldash_store.json")
}

fn default_timeout() -> u64 {
    10
}

/// Dashboard view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Trailing window, in days.
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Rows in the recent evaluations table.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Write the dashboard report here instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            recent_limit: default_recent_limit(),
            output: None,
        }
    }
}

fn default_window_days() -> u32 {
    7
}

fn default_recent_limit() -> usize {
    10
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reject values the command line would also reject.
    pub fn validate(&self) -> Result<()> {
        if self.store.timeout_seconds == 0 {
            anyhow::bail!("store.timeout_seconds must be at least 1");
        }
        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref user) = args.user {
            self.general.user_id = Some(user.clone());
        }

        if let Some(ref store) = args.store {
            self.store.path = store.clone();
        }

        if let Some(timeout) = args.timeout {
            self.store.timeout_seconds = timeout;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
