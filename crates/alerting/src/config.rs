//! Alert configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Minimum ratio between decay window and poll interval
const MIN_POLLS_PER_WINDOW: u64 = 10;

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Confidence threshold must be finite, got {0}")]
    InvalidThreshold(f64),

    #[error("Decay window must be greater than zero")]
    ZeroDecayWindow,

    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,

    #[error("Poll interval {poll_ms}ms must be at least 10x shorter than decay window {window_ms}ms")]
    PollTooSlow { poll_ms: u64, window_ms: u64 },
}

/// What a decoded event with no qualifying detection does to an active alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// Clear straight away
    #[default]
    Immediate,
    /// Leave the alert to the decay timer
    DecayOnly,
}

/// Alert configuration, fixed for the process lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Confidence a detection must strictly exceed (default: 0.7)
    pub confidence_threshold: f64,
    /// Time after the last qualifying event before the alert clears (ms)
    pub decay_window_ms: u64,
    /// Control loop period (ms)
    pub poll_interval_ms: u64,
    /// Handling of non-qualifying events while alerting
    pub clear_policy: ClearPolicy,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            decay_window_ms: 5000,
            poll_interval_ms: 50,
            clear_policy: ClearPolicy::Immediate,
        }
    }
}

impl AlertConfig {
    pub fn decay_window(&self) -> Duration {
        Duration::from_millis(self.decay_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check the configuration can give bounded decay latency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.confidence_threshold.is_finite() {
            return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
        }
        if self.decay_window_ms == 0 {
            return Err(ConfigError::ZeroDecayWindow);
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.poll_interval_ms.saturating_mul(MIN_POLLS_PER_WINDOW) > self.decay_window_ms {
            return Err(ConfigError::PollTooSlow {
                poll_ms: self.poll_interval_ms,
                window_ms: self.decay_window_ms,
            });
        }
        Ok(())
    }
}
