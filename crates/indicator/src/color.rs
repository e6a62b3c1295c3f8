//! Color commands and palette

use serde::{Deserialize, Serialize};
use std::fmt;

/// Intensity triple for the RGB LED, 0-255 per channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct ColorCommand {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ColorCommand {
    pub const OFF: Self = Self::rgb(0, 0, 0);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Channels in R, G, B order
    pub fn channels(&self) -> [u8; 3] {
        [self.red, self.green, self.blue]
    }
}

impl From<[u8; 3]> for ColorCommand {
    fn from([red, green, blue]: [u8; 3]) -> Self {
        Self { red, green, blue }
    }
}

impl From<ColorCommand> for [u8; 3] {
    fn from(color: ColorCommand) -> Self {
        color.channels()
    }
}

impl fmt::Display for ColorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R:{} G:{} B:{}", self.red, self.green, self.blue)
    }
}

/// Colors used for each indicator condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub alert: ColorCommand,
    pub clear: ColorCommand,
    pub disconnected: ColorCommand,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            alert: ColorCommand::RED,
            clear: ColorCommand::GREEN,
            disconnected: ColorCommand::OFF,
        }
    }
}
