//! Configuration file handling for enroll-capture.
//!
//! Loads configuration from `<config dir>/enroll-capture/config.toml` or a custom path.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::camera::{CameraSettings, Resolution};
use crate::enroll::{DEFAULT_BASE_URL, DEFAULT_MAX_RETRIES};
use crate::sequencer::{
    CaptureSettings, DEFAULT_CAPTURE_COUNT, DEFAULT_SETTLE_DELAY, MAX_CAPTURE_COUNT,
};

/// Overrides `backend.base_url` when set (also read from `.env`).
pub const BACKEND_URL_ENV: &str = "ENROLL_BACKEND_URL";

/// Written by `config init`.
pub const DEFAULT_CONFIG: &str = r#"# enroll-capture configuration

[camera]
# Device index (see `enroll-capture list-cameras`)
device = 0
width = 640
height = 480
# Flip frames horizontally before encoding
mirror = false

[capture]
# Frames per enrollment
count = 5
# Pause before each frame, in milliseconds
settle_delay_ms = 500
# JPEG quality between 0.0 and 1.0
jpeg_quality = 0.8

[backend]
base_url = "http://127.0.0.1:5000"
timeout_secs = 60
max_retries = 3
"#;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device: u32,
    pub width: u32,
    pub height: u32,
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: 0,
            width: Resolution::VGA.width,
            height: Resolution::VGA.height,
            mirror: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub count: u32,
    pub settle_delay_ms: u64,
    pub jpeg_quality: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_CAPTURE_COUNT,
            settle_delay_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
            jpeg_quality: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 60,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|u| !u.trim().is_empty()) {
            log::debug!("Backend URL overridden by {}", BACKEND_URL_ENV);
            self.backend.base_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "camera resolution {}x{} must be non-zero",
                self.camera.width, self.camera.height
            )));
        }
        if !(1..=MAX_CAPTURE_COUNT).contains(&self.capture.count) {
            return Err(ConfigError::Invalid(format!(
                "capture.count must be between 1 and {}, got {}",
                MAX_CAPTURE_COUNT, self.capture.count
            )));
        }
        if !(0.0..=1.0).contains(&self.capture.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "capture.jpeg_quality must be between 0.0 and 1.0, got {}",
                self.capture.jpeg_quality
            )));
        }
        Ok(())
    }

    pub fn camera_settings(&self) -> CameraSettings {
        CameraSettings {
            device_index: self.camera.device,
            resolution: Resolution {
                width: self.camera.width,
                height: self.camera.height,
            },
            mirror: self.camera.mirror,
            ..CameraSettings::default()
        }
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            count: self.capture.count,
            settle_delay: Duration::from_millis(self.capture.settle_delay_ms),
            jpeg_quality: (self.capture.jpeg_quality * 100.0).round() as u8,
        }
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("enroll-capture").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from(".enroll-capture.toml"))
}
