//! Alerting System
//!
//! Tracks whether a person is currently present, with a decay timer that
//! clears the alert when qualifying events stop arriving.

mod config;
mod machine;

pub use config::{AlertConfig, ClearPolicy, ConfigError};
pub use machine::{AlertPhase, AlertState, AlertStateMachine, ClearReason, Transition};
