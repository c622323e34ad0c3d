//! Hardware effector boundary.
//!
//! The server core commits commanded values to the priority array
//! first and only then pushes the effective value toward hardware, so
//! an effector failure is never surfaced as a BACnet error; callers
//! log it and move on. The trait keeps the hardware side narrow and
//! synchronous: one write of an effective value, one sample of an
//! input.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::object::BinaryPv;

/// Failures crossing the hardware boundary. Non-fatal by contract.
#[derive(Debug, Error)]
pub enum EffectorError {
    #[error("instance {0} has no hardware mapping")]
    UnmappedInstance(u32),
    #[error("gpio access failed: {0}")]
    Io(#[from] io::Error),
    #[error("unexpected gpio state {0:?}")]
    BadState(String),
}

/// A value crossing the hardware boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectorValue {
    Binary(BinaryPv),
    Analog(f32),
}

/// Synchronous hardware access for commanded outputs and sampled
/// inputs. Implementations enforce their own bounded timeouts.
pub trait Effector {
    /// Commit a new effective value for an output instance.
    fn write(&mut self, instance: u32, value: EffectorValue) -> Result<(), EffectorError>;

    /// Sample the current value of an input instance.
    fn read(&mut self, instance: u32) -> Result<EffectorValue, EffectorError>;
}

/// Reference effector mapping object instances to sysfs GPIO lines.
///
/// Lines are exported and given a direction on first use. Analog
/// outputs have no PWM backend here; the computed duty cycle is only
/// logged.
// TODO: drive hardware PWM through /sys/class/pwm once a chip/channel
// mapping is added to the bootstrap file.
#[derive(Debug)]
pub struct SysfsGpioEffector {
    lines: HashMap<u32, u16>,
    base: PathBuf,
}

impl SysfsGpioEffector {
    pub fn new(lines: HashMap<u32, u16>) -> Self {
        Self::with_base(lines, PathBuf::from("/sys/class/gpio"))
    }

    /// Base-path override used by tests running against a temp dir.
    pub fn with_base(lines: HashMap<u32, u16>, base: PathBuf) -> Self {
        Self { lines, base }
    }

    fn line(&self, instance: u32) -> Result<u16, EffectorError> {
        self.lines.get(&instance).copied().ok_or(EffectorError::UnmappedInstance(instance))
    }

    fn ensure_exported(&self, line: u16, direction: &str) -> Result<PathBuf, EffectorError> {
        let line_dir = self.base.join(format!("gpio{line}"));
        if !line_dir.exists() {
            std::fs::write(self.base.join("export"), line.to_string())?;
            // The kernel needs a moment to populate the line directory.
            std::thread::sleep(Duration::from_millis(100));
        }
        std::fs::write(line_dir.join("direction"), direction)?;
        Ok(line_dir)
    }
}

impl Effector for SysfsGpioEffector {
    fn write(&mut self, instance: u32, value: EffectorValue) -> Result<(), EffectorError> {
        let line = self.line(instance)?;
        match value {
            EffectorValue::Binary(state) => {
                let line_dir = self.ensure_exported(line, "out")?;
                let level = if bool::from(state) { "1" } else { "0" };
                std::fs::write(line_dir.join("value"), level)?;
                debug!("gpio line {line} set {level} for instance {instance}");
                Ok(())
            }
            EffectorValue::Analog(percent) => {
                let duty = (percent * 255.0 / 100.0).clamp(0.0, 255.0) as u8;
                debug!("gpio line {line} duty {duty} ({percent:.1}%) for instance {instance}, no pwm backend");
                Ok(())
            }
        }
    }

    fn read(&mut self, instance: u32) -> Result<EffectorValue, EffectorError> {
        let line = self.line(instance)?;
        let line_dir = self.ensure_exported(line, "in")?;
        let raw = std::fs::read_to_string(line_dir.join("value"))?;
        match raw.trim() {
            "0" => Ok(EffectorValue::Binary(BinaryPv::Inactive)),
            "1" => Ok(EffectorValue::Binary(BinaryPv::Active)),
            other => Err(EffectorError::BadState(other.to_string())),
        }
    }
}

/// In-memory effector for tests: records writes, serves canned inputs.
#[derive(Debug, Default)]
pub struct RecordingEffector {
    writes: Vec<(u32, EffectorValue)>,
    inputs: HashMap<u32, EffectorValue>,
    failing: bool,
}

impl RecordingEffector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, to exercise the non-fatal path.
    pub fn fail_all(&mut self) {
        self.failing = true;
    }

    pub fn set_input(&mut self, instance: u32, value: EffectorValue) {
        self.inputs.insert(instance, value);
    }

    pub fn writes(&self) -> &[(u32, EffectorValue)] {
        &self.writes
    }

    pub fn last_write(&self, instance: u32) -> Option<EffectorValue> {
        self.writes.iter().rev().find(|(i, _)| *i == instance).map(|(_, v)| *v)
    }
}

impl Effector for RecordingEffector {
    fn write(&mut self, instance: u32, value: EffectorValue) -> Result<(), EffectorError> {
        if self.failing {
            return Err(EffectorError::UnmappedInstance(instance));
        }
        self.writes.push((instance, value));
        Ok(())
    }

    fn read(&mut self, instance: u32) -> Result<EffectorValue, EffectorError> {
        if self.failing {
            return Err(EffectorError::UnmappedInstance(instance));
        }
        self.inputs.get(&instance).copied().ok_or(EffectorError::UnmappedInstance(instance))
    }
}
