//! User settings storage
//!
//! Persistent UI flags. The engine itself never reads them; front ends load
//! them next to their other state and consult them when presenting a graph.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

/// File name used inside a settings directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Persisted front-end flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Watch every output of newly added tools
    #[serde(default)]
    pub auto_watch: bool,
    /// Show the error panel when a tool enters an error state
    #[serde(default = "default_true")]
    pub auto_toggle_errors: bool,
    /// Show the watch panel when a port is watched
    #[serde(default = "default_true")]
    pub auto_open_watch: bool,
    /// Lay tools out automatically after edits
    #[serde(default)]
    pub auto_layout: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_watch: false,
            auto_toggle_errors: true,
            auto_open_watch: true,
            auto_layout: false,
        }
    }
}

impl Settings {
    /// Setting keys in display order
    pub const KEYS: [&'static str; 4] = ["autoWatch", "autoToggleErrors", "autoOpenWatch", "autoLayout"];

    /// Read a flag by key
    pub fn get(&self, key: &str) -> Option<bool> {
        match key {
            "autoWatch" => Some(self.auto_watch),
            "autoToggleErrors" => Some(self.auto_toggle_errors),
            "autoOpenWatch" => Some(self.auto_open_watch),
            "autoLayout" => Some(self.auto_layout),
            _ => None,
        }
    }

    /// Write a flag by key
    pub fn set(&mut self, key: &str, value: bool) -> Result<(), SettingsError> {
        let slot = match key {
            "autoWatch" => &mut self.auto_watch,
            "autoToggleErrors" => &mut self.auto_toggle_errors,
            "autoOpenWatch" => &mut self.auto_open_watch,
            "autoLayout" => &mut self.auto_layout,
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        };
        *slot = value;
        Ok(())
    }

    /// Load settings from a directory, falling back to defaults
    pub async fn load(dir: &Path) -> Result<Self, SettingsError> {
        let path = dir.join(SETTINGS_FILE);

        if !fs::try_exists(&path).await? {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).await?;

        serde_json::from_str(&contents).map_err(SettingsError::Parse)
    }

    /// Save settings into a directory
    pub async fn save(&self, dir: &Path) -> Result<(), SettingsError> {
        // Ensure directory exists
        fs::create_dir_all(dir).await?;

        let path = dir.join(SETTINGS_FILE);
        let contents = serde_json::to_string_pretty(self).map_err(SettingsError::Serialize)?;

        fs::write(&path, contents).await?;

        log::info!("Settings saved to {:?}", path);
        Ok(())
    }
}

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse settings: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize settings: {0}")]
    Serialize(serde_json::Error),
    #[error("Unknown setting: {0}")]
    UnknownKey(String),
}
