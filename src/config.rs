//! Configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Where the history is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the history database
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

fn default_database() -> String {
    Config::data_dir()
        .join("history.db")
        .to_string_lossy()
        .to_string()
}

/// Display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Characters shown per history row before truncating
    #[serde(default = "default_item_width")]
    pub item_width: usize,
    /// Wrap long lines in the preview pane
    #[serde(default = "default_preview_wrap")]
    pub preview_wrap: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            item_width: default_item_width(),
            preview_wrap: default_preview_wrap(),
        }
    }
}

fn default_item_width() -> usize {
    50
}

fn default_preview_wrap() -> bool {
    true
}

impl Config {
    /// Load configuration from default location.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            Self::from_file(&config_path.to_string_lossy())
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file.
    pub fn from_file(path: &str) -> Result<Self> {
        let expanded = expand_path(path);
        let content = std::fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read config file {}", expanded))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file {}", expanded))
    }

    fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("clipkeep")
            .join("config.toml")
    }

    /// Get the data directory for the database and logs.
    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("clipkeep")
    }

    /// Resolved path of the history database.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(expand_path(&self.storage.database))
    }
}

/// Expand ~ to home directory.
fn expand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}
