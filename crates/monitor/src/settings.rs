//! Layered settings
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. TOML file (`presence-monitor.toml` in the working directory unless a
//!    path is given)
//! 3. Environment, e.g. `PRESENCE__ALERT__DECAY_WINDOW_MS=3000`

use crate::telemetry::TelemetrySettings;
use alerting::{AlertConfig, ConfigError};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use detection_payload::{DEFAULT_MAX_PAYLOAD_BYTES, MIN_MAX_PAYLOAD_BYTES};
use event_source::MqttConfig;
use indicator::{Palette, PwmConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Settings file looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "presence-monitor.toml";

/// Settings errors
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid alert settings: {0}")]
    Alert(#[from] ConfigError),

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

/// Decoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadSettings {
    /// Largest detection event accepted (bytes)
    pub max_payload_bytes: usize,
}

impl Default for PayloadSettings {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }
}

/// Where indicator colors go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// Log only
    #[default]
    Log,
    /// Linux sysfs PWM
    Pwm,
}

/// Indicator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub output: OutputKind,
    pub palette: Palette,
    pub pwm: PwmConfig,
}

/// Complete device settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub alert: AlertConfig,
    pub payload: PayloadSettings,
    pub indicator: IndicatorSettings,
    pub mqtt: MqttConfig,
    pub telemetry: TelemetrySettings,
    /// Cycle the LED through its colors at startup
    pub self_test: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alert: AlertConfig::default(),
            payload: PayloadSettings::default(),
            indicator: IndicatorSettings::default(),
            mqtt: MqttConfig::default(),
            telemetry: TelemetrySettings::default(),
            self_test: true,
        }
    }
}

impl Settings {
    /// Load from file and environment. A missing default file is not an
    /// error; a missing explicit path is.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        Self::from_builder(
            Config::builder()
                .add_source(file)
                .add_source(
                    Environment::with_prefix("PRESENCE")
                        .prefix_separator("__")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    /// Parse TOML text, without environment overrides
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        Self::from_builder(Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Cross-field checks
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.alert.validate()?;

        if self.payload.max_payload_bytes < MIN_MAX_PAYLOAD_BYTES {
            return Err(SettingsError::Invalid(format!(
                "payload.max_payload_bytes must be at least {}",
                MIN_MAX_PAYLOAD_BYTES
            )));
        }
        Ok(())
    }
}
