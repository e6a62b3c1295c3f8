//! Alert State Machine
//!
//! ```text
//!            qualifying event
//!   Clear ───────────────────────▶ Alerting ◀─┐ qualifying event
//!     ▲                               │  └────┘ (refresh timestamp)
//!     │  decay window elapsed, or     │
//!     └── negative event (Immediate) ─┘
//! ```
//!
//! The machine never reads a clock itself. Callers pass a monotonic
//! `Instant` so decay timing can be driven exactly in tests.

use crate::config::{AlertConfig, ClearPolicy};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Alert phase without timing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPhase {
    #[default]
    Clear,
    Alerting,
}

/// Current alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertState {
    /// Nobody present
    #[default]
    Clear,
    /// Presence reported; `last_qualifying` is the most recent qualifying event
    Alerting { last_qualifying: Instant },
}

impl AlertState {
    pub fn phase(&self) -> AlertPhase {
        match self {
            AlertState::Clear => AlertPhase::Clear,
            AlertState::Alerting { .. } => AlertPhase::Alerting,
        }
    }

    pub fn is_alerting(&self) -> bool {
        matches!(self, AlertState::Alerting { .. })
    }

    /// Time of the most recent qualifying event, if alerting
    pub fn last_qualifying(&self) -> Option<Instant> {
        match self {
            AlertState::Clear => None,
            AlertState::Alerting { last_qualifying } => Some(*last_qualifying),
        }
    }
}

/// Why an alert was cleared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    /// A decoded event carried no qualifying detection
    NegativeEvent,
    /// No qualifying event within the decay window
    Decayed,
}

impl ClearReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClearReason::NegativeEvent => "negative_event",
            ClearReason::Decayed => "decayed",
        }
    }
}

/// Outcome of feeding the machine an input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Clear -> Alerting
    Raised,
    /// Alerting -> Alerting with a fresh timestamp
    Refreshed,
    /// Alerting -> Clear
    Cleared(ClearReason),
    /// No change
    Unchanged,
}

impl Transition {
    /// Whether the phase changed
    pub fn changed_phase(&self) -> bool {
        matches!(self, Transition::Raised | Transition::Cleared(_))
    }
}

/// Owner of the alert state and its decay timer
#[derive(Debug, Clone)]
pub struct AlertStateMachine {
    state: AlertState,
    decay_window: Duration,
    clear_policy: ClearPolicy,
}

impl AlertStateMachine {
    /// Create a machine in the `Clear` state
    pub fn new(config: &AlertConfig) -> Self {
        Self::with_policy(config.decay_window(), config.clear_policy)
    }

    pub fn with_policy(decay_window: Duration, clear_policy: ClearPolicy) -> Self {
        debug!(
            "Creating alert state machine: decay {:?}, policy {:?}",
            decay_window, clear_policy
        );
        Self {
            state: AlertState::Clear,
            decay_window,
            clear_policy,
        }
    }

    /// Current state
    pub fn state(&self) -> AlertState {
        self.state
    }

    pub fn phase(&self) -> AlertPhase {
        self.state.phase()
    }

    /// Apply a successfully decoded event
    pub fn on_event(&mut self, qualifies: bool, now: Instant) -> Transition {
        match (self.state, qualifies) {
            (AlertState::Clear, true) => {
                self.state = AlertState::Alerting { last_qualifying: now };
                info!("Person detected, alert raised");
                Transition::Raised
            }
            (AlertState::Alerting { .. }, true) => {
                self.state = AlertState::Alerting { last_qualifying: now };
                debug!("Alert refreshed");
                Transition::Refreshed
            }
            (AlertState::Alerting { .. }, false) => match self.clear_policy {
                ClearPolicy::Immediate => {
                    self.state = AlertState::Clear;
                    info!("No qualifying detection, alert cleared");
                    Transition::Cleared(ClearReason::NegativeEvent)
                }
                ClearPolicy::DecayOnly => {
                    debug!("Negative event ignored, waiting for decay");
                    Transition::Unchanged
                }
            },
            (AlertState::Clear, false) => Transition::Unchanged,
        }
    }

    /// Clear the alert if the decay window has elapsed since the last
    /// qualifying event
    pub fn check_decay(&mut self, now: Instant) -> Transition {
        let AlertState::Alerting { last_qualifying } = self.state else {
            return Transition::Unchanged;
        };

        let elapsed = now.saturating_duration_since(last_qualifying);
        if elapsed >= self.decay_window {
            self.state = AlertState::Clear;
            info!(
                "No detection for {}ms, alert cleared",
                elapsed.as_millis()
            );
            Transition::Cleared(ClearReason::Decayed)
        } else {
            Transition::Unchanged
        }
    }

    /// Time left before the alert decays, if alerting
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.state.last_qualifying().map(|last| {
            self.decay_window
                .saturating_sub(now.saturating_duration_since(last))
        })
    }
}

impl Default for AlertStateMachine {
    fn default() -> Self {
        Self::new(&AlertConfig::default())
    }
}
