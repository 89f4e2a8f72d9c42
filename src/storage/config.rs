//! Rider profile and application configuration.
//!
//! Stored as TOML in the platform data directory. A missing file means
//! defaults; missing keys within a section fall back to that section's
//! defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metrics::smoothing::DEFAULT_WINDOW_MS;
use crate::route::playback::{DEFAULT_INCREMENT, DEFAULT_TICK};

/// Rider physiology used for zones and W/kg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiderSettings {
    /// Functional Threshold Power in watts (50-500)
    pub ftp: u16,
    /// Weight in kilograms (30-200)
    pub weight_kg: f32,
}

impl Default for RiderSettings {
    fn default() -> Self {
        Self {
            ftp: 250,
            weight_kg: 75.0,
        }
    }
}

impl RiderSettings {
    /// Update FTP after validating it.
    pub fn set_ftp(&mut self, ftp: u16) -> Result<(), ConfigError> {
        if !Self::validate_ftp(ftp) {
            return Err(ConfigError::Invalid(format!(
                "FTP must be between 50 and 500 watts, got {}",
                ftp
            )));
        }
        self.ftp = ftp;
        Ok(())
    }

    /// Update weight after validating it.
    pub fn set_weight(&mut self, weight_kg: f32) -> Result<(), ConfigError> {
        if !Self::validate_weight(weight_kg) {
            return Err(ConfigError::Invalid(format!(
                "Weight must be between 30 and 200 kg, got {}",
                weight_kg
            )));
        }
        self.weight_kg = weight_kg;
        Ok(())
    }

    /// Validate FTP value (50-500 watts).
    pub fn validate_ftp(ftp: u16) -> bool {
        (50..=500).contains(&ftp)
    }

    /// Validate weight value (30-200 kg).
    pub fn validate_weight(weight: f32) -> bool {
        (30.0..=200.0).contains(&weight)
    }
}

/// Longest accepted playback tick (one minute).
pub const MAX_TICK_MS: u64 = 60_000;

/// Route playback pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Tick period in milliseconds
    pub tick_ms: u64,
    /// Progress added per tick
    pub increment: f64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK.as_millis() as u64,
            increment: DEFAULT_INCREMENT,
        }
    }
}

impl PlaybackSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Power smoothing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingSettings {
    /// Rolling window length in milliseconds
    pub window_ms: u64,
}

impl Default for SmoothingSettings {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
        }
    }
}

/// Trainer connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    /// Discovery timeout in seconds
    pub scan_timeout_secs: u64,
    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,
    /// Send Request Control to the control point after connecting
    pub request_control: bool,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            scan_timeout_secs: 30,
            connection_timeout_secs: 10,
            request_control: false,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rider: RiderSettings,
    pub playback: PlaybackSettings,
    pub smoothing: SmoothingSettings,
    pub trainer: TrainerSettings,
}

impl AppConfig {
    /// Check every section for out-of-range values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !RiderSettings::validate_ftp(self.rider.ftp) {
            return Err(ConfigError::Invalid(format!(
                "rider.ftp must be between 50 and 500, got {}",
                self.rider.ftp
            )));
        }
        if !RiderSettings::validate_weight(self.rider.weight_kg) {
            return Err(ConfigError::Invalid(format!(
                "rider.weight_kg must be between 30 and 200, got {}",
                self.rider.weight_kg
            )));
        }
        if !(1..=MAX_TICK_MS).contains(&self.playback.tick_ms) {
            return Err(ConfigError::Invalid(format!(
                "playback.tick_ms must be between 1 and {}, got {}",
                MAX_TICK_MS, self.playback.tick_ms
            )));
        }
        if !(self.playback.increment > 0.0 && self.playback.increment < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "playback.increment must be in (0, 1), got {}",
                self.playback.increment
            )));
        }
        if self.smoothing.window_ms == 0 {
            return Err(ConfigError::Invalid(
                "smoothing.window_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "routesim", "RouteSim")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration from the default location.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&get_config_path())
}

/// Load application configuration from a file, defaults if it does not exist.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;

    Ok(config)
}

/// Save application configuration to the default location.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(config, &get_config_path())
}

/// Save application configuration to a file.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
