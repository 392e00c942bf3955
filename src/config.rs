// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::PlatformBackend;
use crate::backends::types::VideoConstraints;
use crate::constants::{roster, timing};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Directory name under the user config dir
const CONFIG_DIR: &str = "meeting";
/// Settings file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name shown on the local tile
    pub display_name: String,
    /// Media platform to use (PipeWire or Simulated)
    pub backend: PlatformBackend,
    /// Constraints for the local camera
    pub video: VideoConstraints,
    /// Open the microphone together with the camera
    pub capture_audio: bool,
    /// Join with the outgoing microphone muted
    pub start_muted: bool,
    /// Join with the camera off; when false the camera is switched on
    /// through the normal verified toggle right after joining
    pub start_camera_off: bool,
    /// How long transient notices stay visible
    pub notice_duration_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_name: roster::LOCAL_DISPLAY_NAME.to_string(),
            backend: PlatformBackend::default(),
            video: VideoConstraints::default(),
            capture_audio: true,
            start_muted: false,
            start_camera_off: true,
            notice_duration_ms: timing::NOTICE_DURATION_MS,
        }
    }
}

impl Config {
    /// Default location of the settings file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    ///
    /// A missing file is created with the defaults so there is something
    /// to edit.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            warn!("No config directory, using default settings");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, writing default settings");
            let config = Self::default();
            if let Err(e) = config.save() {
                warn!(path = %path.display(), error = %e, "Failed to write default config");
            }
            return config;
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid config, using default settings");
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        info!(path = %path.display(), backend = %config.backend, "Loaded config");
        Ok(config)
    }

    /// Save to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::path().ok_or_else(|| AppError::Config("no config directory".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        debug!(path = %path.display(), "Saved config");
        Ok(())
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config: Config = serde_json::from_str(r#"{ "start_muted": true }"#).unwrap();
        assert!(config.start_muted);
        assert!(config.start_camera_off);
        assert_eq!(config.display_name, "You");
    }
}
