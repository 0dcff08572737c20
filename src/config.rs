// Stereux Core - Sliding-window playlist engine for the Stereux player
// Copyright (C) 2025 Stereux contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Player configuration
//!
//! Settings are stored as pretty-printed JSON. Every field has a default, so a
//! partial file (or no file at all) is valid.
//!
//! # Default Locations
//! - macOS: ~/Library/Application Support/Stereux/
//! - Linux: ~/.local/share/Stereux/
//! - Windows: %APPDATA%/Stereux/

use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default number of songs held in the playlist window (odd, so there is a middle)
pub const DEFAULT_WINDOW_CAPACITY: usize = 11;

/// Media files are large; the timeout is measured in minutes
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 1000;

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Root directory for downloaded songs (`<data_root>/<id>/<id>.<ext>`)
    pub data_root: PathBuf,

    /// SQLite catalog file
    pub database_path: PathBuf,

    /// Songs kept in the playlist window
    pub window_capacity: usize,

    /// Timeout for each media or artwork transfer
    pub transfer_timeout_secs: u64,

    /// Transfers allowed on the network at once
    pub max_concurrent_transfers: usize,

    /// Materialization attempts for the current song before giving up
    pub max_materialize_attempts: u32,

    /// Random draws per window slot before falling back to a scan
    pub max_draw_attempts: u32,

    /// Base URL that relative song links resolve against
    pub base_url: String,

    /// Image shown for songs without artwork
    pub default_artwork: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        let app_dir = default_app_dir();
        Self {
            data_root: app_dir.join("songs"),
            database_path: app_dir.join("songs.db"),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            transfer_timeout_secs: DEFAULT_TRANSFER_TIMEOUT_SECS,
            max_concurrent_transfers: 4,
            max_materialize_attempts: 3,
            max_draw_attempts: 32,
            base_url: "https://ncs.io/".to_string(),
            default_artwork: None,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration as JSON, creating the parent directory
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    /// Reject values the playlist cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.window_capacity == 0 {
            return Err(PlayerError::ConfigurationError(
                "window_capacity must be at least 1".to_string(),
            ));
        }
        if self.transfer_timeout_secs == 0 {
            return Err(PlayerError::ConfigurationError(
                "transfer_timeout_secs must be positive".to_string(),
            ));
        }
        if self.max_concurrent_transfers == 0 {
            return Err(PlayerError::ConfigurationError(
                "max_concurrent_transfers must be at least 1".to_string(),
            ));
        }
        if self.max_materialize_attempts == 0 || self.max_draw_attempts == 0 {
            return Err(PlayerError::ConfigurationError(
                "attempt limits must be at least 1".to_string(),
            ));
        }
        let base = Url::parse(&self.base_url).map_err(|e| {
            PlayerError::ConfigurationError(format!("base_url '{}': {}", self.base_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(PlayerError::ConfigurationError(format!(
                "base_url '{}' cannot be used as a base",
                self.base_url
            )));
        }
        Ok(())
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    /// Parsed `base_url`
    pub fn base_url(&self) -> Result<Url> {
        Ok(Url::parse(&self.base_url)?)
    }

    /// Default location of the config file
    pub fn default_path() -> PathBuf {
        default_app_dir().join("config.json")
    }
}

/// Platform application data directory for Stereux
pub fn default_app_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("Stereux")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(appdata).join("Stereux")
    }

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".local").join("share").join("Stereux")
    }
}
