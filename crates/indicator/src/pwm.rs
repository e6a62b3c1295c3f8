//! Linux sysfs PWM output
//!
//! Drives one PWM channel per LED color through
//! `/sys/class/pwm/pwmchipN/pwmM/{period,duty_cycle,enable}`.

use crate::color::ColorCommand;
use crate::sink::OutputSink;
use crate::IndicatorError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PWM output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PwmConfig {
    /// PWM chip directory
    pub chip: PathBuf,
    /// Channel numbers for red, green, blue
    pub channels: [u32; 3],
    /// PWM period in nanoseconds (default: 1 kHz)
    pub period_ns: u32,
    /// Invert duty cycle for common-anode LEDs
    pub common_anode: bool,
}

impl Default for PwmConfig {
    fn default() -> Self {
        Self {
            chip: PathBuf::from("/sys/class/pwm/pwmchip0"),
            channels: [0, 1, 2],
            period_ns: 1_000_000,
            common_anode: false,
        }
    }
}

/// RGB LED on three sysfs PWM channels
#[derive(Debug)]
pub struct PwmSink {
    duty_paths: [PathBuf; 3],
    period_ns: u32,
    common_anode: bool,
    last: Option<ColorCommand>,
}

impl PwmSink {
    /// Export and enable the configured channels
    pub fn open(config: &PwmConfig) -> Result<Self, IndicatorError> {
        if config.period_ns == 0 {
            return Err(IndicatorError::Config("period_ns must be > 0".to_string()));
        }

        info!(
            "Opening PWM LED on {} channels {:?}",
            config.chip.display(),
            config.channels
        );

        let mut duty_paths: [PathBuf; 3] = Default::default();
        for (slot, &channel) in duty_paths.iter_mut().zip(config.channels.iter()) {
            let dir = export_channel(&config.chip, channel)?;
            write_attr(&dir.join("period"), config.period_ns)?;
            write_attr(&dir.join("enable"), 1)?;
            *slot = dir.join("duty_cycle");
        }

        Ok(Self {
            duty_paths,
            period_ns: config.period_ns,
            common_anode: config.common_anode,
            last: None,
        })
    }

    /// Duty cycle in nanoseconds for an 8-bit intensity
    fn duty_ns(&self, level: u8) -> u32 {
        let level = if self.common_anode { 255 - level } else { level };
        (u64::from(self.period_ns) * u64::from(level) / 255) as u32
    }
}

impl OutputSink for PwmSink {
    fn apply(&mut self, command: ColorCommand) -> Result<(), IndicatorError> {
        if self.last == Some(command) {
            return Ok(());
        }

        for (path, level) in self.duty_paths.iter().zip(command.channels()) {
            write_attr(path, self.duty_ns(level))?;
        }
        debug!("PWM LED set to {}", command);
        self.last = Some(command);
        Ok(())
    }
}

fn export_channel(chip: &Path, channel: u32) -> Result<PathBuf, IndicatorError> {
    let dir = chip.join(format!("pwm{}", channel));
    if !dir.exists() {
        write_attr(&chip.join("export"), channel)?;
    }
    if !dir.exists() {
        return Err(IndicatorError::ChannelUnavailable(dir.display().to_string()));
    }
    Ok(dir)
}

fn write_attr(path: &Path, value: u32) -> Result<(), IndicatorError> {
    fs::write(path, value.to_string()).map_err(|source| IndicatorError::Write {
        path: path.display().to_string(),
        source,
    })
}
