//! Presence Indicator
//!
//! Wires detection events from the broker through decode, evaluation and
//! the alert state machine to the status LED, on a single control loop.

pub mod monitor;
pub mod pipeline;
pub mod settings;
pub mod telemetry;

pub use monitor::{Monitor, StepReport};
pub use pipeline::{AlertPipeline, EventOutcome};
pub use self_test::run_lamp_test;
pub use settings::{IndicatorSettings, OutputKind, PayloadSettings, Settings, SettingsError};
pub use telemetry::{init_logging, install_metrics_exporter, TelemetryError, TelemetrySettings};
