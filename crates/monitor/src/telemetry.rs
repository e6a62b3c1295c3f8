//! Logging and metrics setup

use metrics_exporter_prometheus::PrometheusBuilder;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tracing::{info, Level};

pub const EVENTS_TOTAL: &str = "presence_events_total";
pub const DECODE_ERRORS_TOTAL: &str = "presence_decode_errors_total";
pub const ALERTS_RAISED_TOTAL: &str = "presence_alerts_raised_total";
pub const ALERTS_CLEARED_TOTAL: &str = "presence_alerts_cleared_total";
pub const SINK_ERRORS_TOTAL: &str = "presence_sink_errors_total";
pub const ALERTING: &str = "presence_alerting";
pub const CONNECTED: &str = "presence_connected";

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log level: {0}")]
    LogLevel(String),

    #[error("Failed to install log subscriber: {0}")]
    Logging(String),

    #[error("Failed to start metrics exporter: {0}")]
    Metrics(String),
}

/// Telemetry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Maximum log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub json_logs: bool,
    /// Address for the Prometheus scrape endpoint, disabled when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_addr: None,
        }
    }
}

impl TelemetrySettings {
    pub fn level(&self) -> Result<Level, TelemetryError> {
        self.log_level
            .parse()
            .map_err(|_| TelemetryError::LogLevel(self.log_level.clone()))
    }
}

/// Initialize logging
pub fn init_logging(settings: &TelemetrySettings) -> Result<(), TelemetryError> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(settings.level()?)
        .with_target(true);

    let result = if settings.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| TelemetryError::Logging(e.to_string()))
}

/// Start the Prometheus exporter and register metric descriptions
pub fn install_metrics_exporter(addr: SocketAddr) -> Result<(), TelemetryError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;

    describe_metrics();
    info!("Metrics exporter listening on {}", addr);
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(EVENTS_TOTAL, "Detection events received");
    metrics::describe_counter!(DECODE_ERRORS_TOTAL, "Detection events dropped as undecodable");
    metrics::describe_counter!(ALERTS_RAISED_TOTAL, "Transitions from clear to alerting");
    metrics::describe_counter!(ALERTS_CLEARED_TOTAL, "Transitions from alerting to clear");
    metrics::describe_counter!(SINK_ERRORS_TOTAL, "Failed indicator writes");
    metrics::describe_gauge!(ALERTING, "1 while a person is reported present");
    metrics::describe_gauge!(CONNECTED, "1 while the broker session is up");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        let settings = TelemetrySettings::default();
        assert_eq!(settings.level().unwrap(), Level::INFO);

        let settings = TelemetrySettings {
            log_level: "DEBUG".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.level().unwrap(), Level::DEBUG);

        let settings = TelemetrySettings {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(settings.level(), Err(TelemetryError::LogLevel(_))));
    }
}
