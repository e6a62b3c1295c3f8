//! Status Indicator
//!
//! Maps alert state and broker connectivity onto a tri-color LED and
//! applies the result through an output sink:
//! - Alerting: red
//! - Clear: green
//! - Disconnected: off, whatever the alert state

pub mod color;
pub mod mapper;
pub mod pwm;
pub mod sink;

pub use color::{ColorCommand, Palette};
pub use mapper::IndicatorMapper;
pub use pwm::{PwmConfig, PwmSink};
pub use sink::{LogSink, OutputSink, RecordingSink};

use thiserror::Error;

/// Indicator output errors
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("PWM channel not available: {0}")]
    ChannelUnavailable(String),

    #[error("Invalid PWM configuration: {0}")]
    Config(String),
}
