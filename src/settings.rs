use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{MagnitudeScale, SmoothingRate, Window};
use crate::audio::Ingestion;

/// Errors from loading or validating settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Returns the path to the settings file: `~/.config/spectro-rs/settings.json`
pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("spectro-rs");
    path.push("settings.json");
    path
}

/// Static configuration of the capture and analysis pipeline.
///
/// Serialized as JSON to the platform config directory.
/// Fields use `#[serde(default)]` so that adding new settings
/// won't break existing config files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSettings {
    // Shape
    pub frame_len: usize,
    pub history_len: usize,

    // Smoothing
    pub rates: Vec<SmoothingRate>,
    pub rms_decay: f32,

    // Spectrum
    pub magnitude: MagnitudeScale,
    pub window: Window,

    // Hand-off
    pub ingestion: Ingestion,
    pub queue_depth: usize,

    // Device
    pub device: Option<String>,
    pub sample_rate: Option<u32>,

    // Consumer clock
    pub tick_interval_ms: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            frame_len: 512,
            history_len: 128,

            rates: SmoothingRate::defaults(),
            rms_decay: 0.9,

            magnitude: MagnitudeScale::default(),
            window: Window::default(),

            ingestion: Ingestion::default(),
            queue_depth: 2,

            device: None,
            sample_rate: None,

            tick_interval_ms: 16,
        }
    }
}

impl AnalyzerSettings {
    /// Load settings from disk, falling back to defaults on any error.
    pub fn load() -> Self {
        let path = settings_path();
        match Self::load_from(&path) {
            Ok(settings) => {
                log::info!("Loaded settings from {}", path.display());
                settings
            }
            Err(ConfigError::Io(e)) => {
                log::info!("No settings file found ({}), using defaults", e);
                Self::default()
            }
            Err(e) => {
                log::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Load settings from `path`, failing on missing or malformed files.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save settings to the default location as pretty JSON.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = settings_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check every constraint once, before anything is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_len < 2 || self.frame_len % 2 != 0 {
            return Err(invalid(format!(
                "frame_len must be a positive even number, got {}",
                self.frame_len
            )));
        }
        if self.history_len == 0 {
            return Err(invalid("history_len must be positive".to_string()));
        }
        if self.rates.is_empty() {
            return Err(invalid("at least one smoothing rate is required".to_string()));
        }

        let mut names = HashSet::new();
        for rate in &self.rates {
            if !in_unit_interval(rate.alpha) {
                return Err(invalid(format!(
                    "rate {:?}: alpha must lie in (0, 1), got {}",
                    rate.name, rate.alpha
                )));
            }
            if !names.insert(rate.name.as_str()) {
                return Err(invalid(format!("duplicate rate name {:?}", rate.name)));
            }
        }

        if !in_unit_interval(self.rms_decay) {
            return Err(invalid(format!(
                "rms_decay must lie in (0, 1), got {}",
                self.rms_decay
            )));
        }
        if self.ingestion == Ingestion::Queued && self.queue_depth < 2 {
            return Err(invalid(format!(
                "queue_depth must be at least 2 frames, got {}",
                self.queue_depth
            )));
        }
        if self.sample_rate == Some(0) {
            return Err(invalid("sample_rate must be positive".to_string()));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms must be positive".to_string()));
        }

        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

fn in_unit_interval(value: f32) -> bool {
    value > 0.0 && value < 1.0
}
