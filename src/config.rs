// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::types::{CamSelector, CaptureMode, FlashMode};
use crate::constants::{
    DEFAULT_CAPTURE_MODE, DEFAULT_EXPOSURE, DEFAULT_FLASH, DEFAULT_TORCH, default_selector, paths,
};
use crate::errors::SessionResult;
use crate::format_picker::CamFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Initial configuration of a camera session
///
/// Missing fields take their defaults, so a partial JSON file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub capture_mode: CaptureMode,
    pub cam_selector: CamSelector,
    /// Format constraints, most important first
    pub cam_format: CamFormat,
    /// Initial zoom; `None` keeps the device minimum
    pub zoom: Option<f32>,
    /// Exposure compensation in EV
    pub exposure: f32,
    pub flash: FlashMode,
    pub torch: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_mode: DEFAULT_CAPTURE_MODE,
            cam_selector: default_selector(),
            cam_format: CamFormat::default(),
            zoom: None,
            exposure: DEFAULT_EXPOSURE,
            flash: DEFAULT_FLASH,
            torch: DEFAULT_TORCH,
        }
    }
}

impl SessionConfig {
    /// Read a configuration from a JSON file
    pub fn load(path: &Path) -> SessionResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Loaded session config");
        Ok(config)
    }

    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> SessionResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Default location: `<config dir>/camera-session/session.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(paths::APP_DIR).join(paths::CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            warn!("No config directory available, using default session config");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No session config file, using defaults");
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Invalid session config, using defaults");
                Self::default()
            }
        }
    }

    /// Write the configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> SessionResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
