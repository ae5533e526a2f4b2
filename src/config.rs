// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{CameraBackendType, EnclosurePanel};
use crate::constants::{app, sampling, timing};
use crate::errors::{AppResult, ScanError};
use crate::orientation::DisplayOrientation;
use crate::scanner::SessionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// User configuration
///
/// Stored as JSON in `$XDG_CONFIG_HOME/barcode-scanner/config.json`.
/// Missing keys take their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Delay between decode attempts
    pub sample_interval_ms: u64,
    /// How long to wait for the first preview frame
    pub preview_start_timeout_secs: u64,
    /// Frames are downscaled so neither side exceeds this before decoding
    pub max_sample_dimension: u32,
    /// Camera to prefer (front or back)
    pub preferred_panel: EnclosurePanel,
    /// Camera backend to use (GStreamer or virtual)
    pub backend: CameraBackendType,
    /// Default for scans that do not set `tryHarder`
    pub try_harder: bool,
    /// Keep the screen awake while previewing
    pub inhibit_screensaver: bool,
    /// Orientation assumed until the platform reports one
    pub display_orientation: DisplayOrientation,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_interval_ms: timing::SAMPLE_INTERVAL_MS,
            preview_start_timeout_secs: timing::PREVIEW_START_TIMEOUT_SECS,
            max_sample_dimension: sampling::MAX_SAMPLE_DIMENSION,
            preferred_panel: EnclosurePanel::Back,
            backend: CameraBackendType::default(),
            try_harder: true,
            inhibit_screensaver: true,
            display_orientation: DisplayOrientation::default(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(app::APP_NAME).join(app::CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("No config directory, using default configuration");
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Invalid config file, using defaults");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| ScanError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ScanError::Config(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms.max(1))
    }

    pub fn preview_start_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_start_timeout_secs)
    }

    /// Settings for the scan controller
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            sample_interval: self.sample_interval(),
            preview_start_timeout: self.preview_start_timeout(),
            initial_orientation: self.display_orientation,
            max_sample_dimension: self.max_sample_dimension,
            preferred_panel: self.preferred_panel,
            default_try_harder: self.try_harder,
        }
    }
}
