//! Alert state to color mapping

use crate::color::{ColorCommand, Palette};
use alerting::AlertPhase;

/// Pure mapping from (alert phase, connectivity) to a color
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorMapper {
    palette: Palette,
}

impl IndicatorMapper {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Color for the given inputs. Loss of connectivity takes precedence so
    /// a stale alert is never shown while no events can arrive.
    pub fn render(&self, phase: AlertPhase, connected: bool) -> ColorCommand {
        if !connected {
            return self.palette.disconnected;
        }
        match phase {
            AlertPhase::Alerting => self.palette.alert,
            AlertPhase::Clear => self.palette.clear,
        }
    }
}
