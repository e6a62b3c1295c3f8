//! Output sinks

use crate::color::ColorCommand;
use crate::IndicatorError;
use tracing::{info, trace};

/// Anything that can show a color.
///
/// `apply` is called on every control loop iteration, usually with the same
/// color as last time, so implementations must tolerate repeats.
pub trait OutputSink {
    fn apply(&mut self, command: ColorCommand) -> Result<(), IndicatorError>;
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn apply(&mut self, command: ColorCommand) -> Result<(), IndicatorError> {
        (**self).apply(command)
    }
}

/// Sink that only logs, for hosts without an LED
#[derive(Debug, Default)]
pub struct LogSink {
    last: Option<ColorCommand>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputSink for LogSink {
    fn apply(&mut self, command: ColorCommand) -> Result<(), IndicatorError> {
        if self.last == Some(command) {
            trace!("LED unchanged ({})", command);
        } else {
            info!("LED set to {}", command);
            self.last = Some(command);
        }
        Ok(())
    }
}

/// Sink that records every command it is given
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    commands: Vec<ColorCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[ColorCommand] {
        &self.commands
    }

    pub fn last(&self) -> Option<ColorCommand> {
        self.commands.last().copied()
    }
}

impl OutputSink for RecordingSink {
    fn apply(&mut self, command: ColorCommand) -> Result<(), IndicatorError> {
        self.commands.push(command);
        Ok(())
    }
}
