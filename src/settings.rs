//! Player settings and preferences
//!
//! Persisted separately from level data as a small JSON file. Missing fields
//! fall back to their defaults so older files keep loading.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // === Gameplay ===
    /// Seconds subtracted from every press (positive = player presses late)
    pub input_calibration_sec: f32,
    /// Player bouncers bounce by themselves
    pub robot_mode: bool,
    /// Click on every beat
    pub metronome: bool,

    // === Audio ===
    /// Master volume (0.0 - 1.0)
    pub master_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Music volume (0.0 - 1.0)
    pub music_volume: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_calibration_sec: 0.0,
            robot_mode: false,
            metronome: false,

            master_volume: 0.8,
            sfx_volume: 1.0,
            music_volume: 0.7,
        }
    }
}

impl Settings {
    /// Largest calibration accepted, seconds either way
    pub const MAX_CALIBRATION_SEC: f32 = 0.5;

    /// Clamp values into their valid ranges
    pub fn sanitized(mut self) -> Self {
        let unit = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 1.0 };
        self.master_volume = unit(self.master_volume);
        self.sfx_volume = unit(self.sfx_volume);
        self.music_volume = unit(self.music_volume);
        self.input_calibration_sec = if self.input_calibration_sec.is_finite() {
            self.input_calibration_sec
                .clamp(-Self::MAX_CALIBRATION_SEC, Self::MAX_CALIBRATION_SEC)
        } else {
            0.0
        };
        self
    }

    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str::<Self>(json)?.sanitized())
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load settings, using defaults when the file does not exist yet
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let settings = Self::from_json(&fs::read_to_string(path)?)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        log::info!("Settings saved");
        Ok(())
    }
}
