//! Bootstrap configuration.
//!
//! A JSON file seeds the object table at startup: a `device` section
//! for the server identity and a `points` array mapping GPIO lines to
//! BACnet objects. Only the resulting object table matters to the
//! protocol core; the file is read once and never written back.
//!
//! ```json
//! {
//!   "device": { "instance": 260, "vendor_identifier": 999 },
//!   "points": [
//!     { "kind": "binary-output", "instance": 4018, "name": "Test LED",
//!       "pin": 18, "active_text": "On", "inactive_text": "Off" },
//!     { "kind": "analog-input", "instance": 1020, "name": "Temperature",
//!       "pin": 20, "value": 20.0 }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::effector::Effector;
use crate::object::store::DuplicateObject;
use crate::object::{BinaryPv, ObjectRecord, NAME_MAX};
use crate::server::{DeviceConfig, Server};

/// Bootstrap validation and parse failures. All of these are init
/// faults; a running server never sees them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read bootstrap file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed bootstrap file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("point instance {0} has an empty name")]
    EmptyName(u32),
    #[error("point instance {instance} name exceeds {NAME_MAX} bytes")]
    NameTooLong { instance: u32 },
    #[error("instance {0} does not fit the 22-bit identifier field")]
    InstanceOutOfRange(u32),
    #[error("binary point instance {instance} has initial value {value}, expected 0 or 1")]
    BinaryValueOutOfRange { instance: u32, value: f64 },
    #[error(transparent)]
    Duplicate(#[from] DuplicateObject),
}

/// The object kinds a point may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PointKind {
    AnalogInput,
    AnalogOutput,
    BinaryInput,
    BinaryOutput,
}

/// One GPIO point record.
#[derive(Debug, Clone, Deserialize)]
pub struct PointConfig {
    pub kind: PointKind,
    pub instance: u32,
    pub name: String,
    /// Initial Present-Value; 0/1 for binary kinds.
    #[serde(default)]
    pub value: f64,
    pub active_text: Option<String>,
    pub inactive_text: Option<String>,
    /// Engineering-units override for analog kinds.
    pub units: Option<u32>,
    /// GPIO line for the sysfs effector, when this point is wired.
    pub pin: Option<u16>,
}

/// The `device` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSection {
    pub instance: u32,
    #[serde(default)]
    pub vendor_identifier: u32,
    #[serde(default = "default_max_apdu")]
    pub max_apdu: u16,
    #[serde(default = "default_apdu_timeout")]
    pub apdu_timeout_seconds: u32,
    #[serde(default)]
    pub time_sync: bool,
    #[serde(default)]
    pub cov: bool,
}

fn default_max_apdu() -> u16 {
    crate::MAX_APDU as u16
}

fn default_apdu_timeout() -> u32 {
    3
}

/// The whole bootstrap file.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub device: DeviceSection,
    #[serde(default)]
    pub points: Vec<PointConfig>,
}

impl BootstrapConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Instance-to-line table for the sysfs effector.
    pub fn gpio_lines(&self) -> HashMap<u32, u16> {
        self.points
            .iter()
            .filter_map(|point| point.pin.map(|pin| (point.instance, pin)))
            .collect()
    }

    /// Validate every point and build the server around the effector.
    pub fn build_server(&self, effector: Box<dyn Effector>) -> Result<Server, ConfigError> {
        let device = DeviceConfig {
            instance: self.device.instance,
            vendor_identifier: self.device.vendor_identifier,
            max_apdu: self.device.max_apdu,
            apdu_timeout_seconds: self.device.apdu_timeout_seconds,
            time_sync: self.device.time_sync,
            cov: self.device.cov,
        };
        if device.instance > 0x3F_FFFF {
            return Err(ConfigError::InstanceOutOfRange(device.instance));
        }
        let mut server = Server::new(device, effector);
        for point in &self.points {
            server.add_point(point.record()?)?;
        }
        Ok(server)
    }
}

impl PointConfig {
    /// Build the object record, enforcing the data-model constraints.
    fn record(&self) -> Result<ObjectRecord, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName(self.instance));
        }
        if self.name.len() > NAME_MAX {
            return Err(ConfigError::NameTooLong { instance: self.instance });
        }
        if self.instance > 0x3F_FFFF {
            return Err(ConfigError::InstanceOutOfRange(self.instance));
        }

        let mut record = match self.kind {
            PointKind::AnalogInput => {
                ObjectRecord::analog_input(self.instance, self.name.clone(), self.value as f32)
            }
            PointKind::AnalogOutput => {
                ObjectRecord::analog_output(self.instance, self.name.clone(), self.value as f32)
            }
            PointKind::BinaryInput => {
                ObjectRecord::binary_input(self.instance, self.name.clone(), self.binary_value()?)
            }
            PointKind::BinaryOutput => {
                ObjectRecord::binary_output(self.instance, self.name.clone(), self.binary_value()?)
            }
        };
        if let Some(text) = &self.active_text {
            record.active_text = text.clone();
        }
        if let Some(text) = &self.inactive_text {
            record.inactive_text = text.clone();
        }
        if let Some(units) = self.units {
            record.units = units;
        }
        Ok(record)
    }

    fn binary_value(&self) -> Result<BinaryPv, ConfigError> {
        match self.value {
            v if v == 0.0 => Ok(BinaryPv::Inactive),
            v if v == 1.0 => Ok(BinaryPv::Active),
            value => Err(ConfigError::BinaryValueOutOfRange { instance: self.instance, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effector::RecordingEffector;
    use crate::object::{units, ObjectIdentifier, ObjectType};

    const SAMPLE: &str = r#"{
        "device": { "instance": 260, "vendor_identifier": 999 },
        "points": [
            { "kind": "binary-output", "instance": 4018, "name": "Test LED",
              "pin": 18, "active_text": "On", "inactive_text": "Off" },
            { "kind": "binary-input", "instance": 3019, "name": "Motion Sensor", "pin": 19 },
            { "kind": "analog-input", "instance": 1020, "name": "Temperature",
              "pin": 20, "value": 20.0 },
            { "kind": "analog-output", "instance": 2021, "name": "Fan Control",
              "pin": 21, "units": 98 }
        ]
    }"#;

    #[test]
    fn sample_bootstrap_builds_a_server() {
        let config = BootstrapConfig::from_json(SAMPLE).unwrap();
        let server = config.build_server(Box::new(RecordingEffector::new())).unwrap();
        assert_eq!(server.object_count(), 5);
        assert_eq!(server.device().vendor_identifier, 999);
        assert_eq!(server.device().max_apdu, crate::MAX_APDU as u16);
    }

    #[test]
    fn gpio_lines_map_instances_to_pins() {
        let config = BootstrapConfig::from_json(SAMPLE).unwrap();
        let lines = config.gpio_lines();
        assert_eq!(lines.get(&4018), Some(&18));
        assert_eq!(lines.get(&1020), Some(&20));
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn texts_and_units_are_applied() {
        let config = BootstrapConfig::from_json(SAMPLE).unwrap();
        let led = config.points[0].record().unwrap();
        assert_eq!(led.active_text, "On");
        assert_eq!(led.inactive_text, "Off");
        assert_eq!(led.units, units::NO_UNITS);

        let fan = config.points[3].record().unwrap();
        assert_eq!(fan.units, units::PERCENT);
        assert_eq!(fan.identifier, ObjectIdentifier::new(ObjectType::AnalogOutput, 2021));
    }

    #[test]
    fn name_constraints_are_enforced() {
        let mut config = BootstrapConfig::from_json(SAMPLE).unwrap();
        config.points[0].name = String::new();
        assert!(matches!(config.points[0].record(), Err(ConfigError::EmptyName(4018))));

        config.points[0].name = "x".repeat(NAME_MAX + 1);
        assert!(matches!(
            config.points[0].record(),
            Err(ConfigError::NameTooLong { instance: 4018 })
        ));
    }

    #[test]
    fn binary_initial_values_must_be_two_state() {
        let mut config = BootstrapConfig::from_json(SAMPLE).unwrap();
        config.points[0].value = 2.0;
        assert!(matches!(
            config.points[0].record(),
            Err(ConfigError::BinaryValueOutOfRange { instance: 4018, .. })
        ));
    }

    #[test]
    fn duplicate_points_fail_at_init() {
        let mut config = BootstrapConfig::from_json(SAMPLE).unwrap();
        let clone = config.points[0].clone();
        config.points.push(clone);
        assert!(matches!(
            config.build_server(Box::new(RecordingEffector::new())),
            Err(ConfigError::Duplicate(_))
        ));
    }

    #[test]
    fn instance_width_is_checked() {
        let mut config = BootstrapConfig::from_json(SAMPLE).unwrap();
        config.points[0].instance = 0x40_0000;
        assert!(matches!(
            config.points[0].record(),
            Err(ConfigError::InstanceOutOfRange(0x40_0000))
        ));
    }

    #[test]
    fn missing_device_section_is_a_parse_error() {
        assert!(matches!(
            BootstrapConfig::from_json(r#"{ "points": [] }"#),
            Err(ConfigError::Json(_))
        ));
    }
}
