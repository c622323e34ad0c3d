//! BACnet object model.
//!
//! Defines the object types the server exposes (Device, Analog
//! Input/Output, Binary Input/Output), their identifiers, the typed
//! value slots that back Present-Value, and the object records held by
//! the store. Output objects are commandable: their Present-Value is
//! derived from a 16-slot priority array rather than written directly.

use crate::object::commandable::PriorityArray;

/// Priority engine for commandable outputs.
pub mod commandable;
/// Keyed object table.
pub mod store;

/// Longest accepted object name, in bytes.
pub const NAME_MAX: usize = 64;

/// BACnet object types recognized by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ObjectType {
    AnalogInput = 0,
    AnalogOutput = 1,
    BinaryInput = 3,
    BinaryOutput = 4,
    Device = 8,
}

impl ObjectType {
    /// True for the output types whose Present-Value is commanded
    /// through a priority array.
    pub fn is_commandable(self) -> bool {
        matches!(self, ObjectType::AnalogOutput | ObjectType::BinaryOutput)
    }

    /// True for the input types refreshed from the effector.
    pub fn is_input(self) -> bool {
        matches!(self, ObjectType::AnalogInput | ObjectType::BinaryInput)
    }

    /// True for the two-state types.
    pub fn is_binary(self) -> bool {
        matches!(self, ObjectType::BinaryInput | ObjectType::BinaryOutput)
    }

    /// True for the floating-point types.
    pub fn is_analog(self) -> bool {
        matches!(self, ObjectType::AnalogInput | ObjectType::AnalogOutput)
    }
}

impl TryFrom<u16> for ObjectType {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, ()> {
        match value {
            0 => Ok(ObjectType::AnalogInput),
            1 => Ok(ObjectType::AnalogOutput),
            3 => Ok(ObjectType::BinaryInput),
            4 => Ok(ObjectType::BinaryOutput),
            8 => Ok(ObjectType::Device),
            _ => Err(()),
        }
    }
}

/// Object identifier: type plus 22-bit instance number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier {
    pub object_type: ObjectType,
    pub instance: u32,
}

impl ObjectIdentifier {
    pub fn new(object_type: ObjectType, instance: u32) -> Self {
        Self { object_type, instance }
    }

    /// Instance numbers are limited to 22 bits on the wire.
    pub fn is_valid(&self) -> bool {
        self.instance <= 0x3F_FFFF
    }
}

/// BACnet property identifiers the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PropertyIdentifier {
    ActiveText = 4,
    ApduTimeout = 11,
    ApplicationSoftwareVersion = 12,
    Description = 28,
    FirmwareRevision = 44,
    InactiveText = 46,
    LocalDate = 56,
    LocalTime = 57,
    MaxApduLengthAccepted = 62,
    ModelName = 70,
    NumberOfApduRetries = 73,
    ObjectIdentifier = 75,
    ObjectList = 76,
    ObjectName = 77,
    ObjectType = 79,
    OutOfService = 81,
    PresentValue = 85,
    PriorityArray = 87,
    ProtocolConformanceClass = 95,
    ProtocolObjectTypesSupported = 96,
    ProtocolServicesSupported = 97,
    ProtocolVersion = 98,
    RelinquishDefault = 104,
    SegmentationSupported = 107,
    StatusFlags = 111,
    SystemStatus = 112,
    Units = 117,
    VendorIdentifier = 120,
    VendorName = 121,
}

impl TryFrom<u32> for PropertyIdentifier {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, ()> {
        match value {
            4 => Ok(Self::ActiveText),
            11 => Ok(Self::ApduTimeout),
            12 => Ok(Self::ApplicationSoftwareVersion),
            28 => Ok(Self::Description),
            44 => Ok(Self::FirmwareRevision),
            46 => Ok(Self::InactiveText),
            56 => Ok(Self::LocalDate),
            57 => Ok(Self::LocalTime),
            62 => Ok(Self::MaxApduLengthAccepted),
            70 => Ok(Self::ModelName),
            73 => Ok(Self::NumberOfApduRetries),
            75 => Ok(Self::ObjectIdentifier),
            76 => Ok(Self::ObjectList),
            77 => Ok(Self::ObjectName),
            79 => Ok(Self::ObjectType),
            81 => Ok(Self::OutOfService),
            85 => Ok(Self::PresentValue),
            87 => Ok(Self::PriorityArray),
            95 => Ok(Self::ProtocolConformanceClass),
            96 => Ok(Self::ProtocolObjectTypesSupported),
            97 => Ok(Self::ProtocolServicesSupported),
            98 => Ok(Self::ProtocolVersion),
            104 => Ok(Self::RelinquishDefault),
            107 => Ok(Self::SegmentationSupported),
            111 => Ok(Self::StatusFlags),
            112 => Ok(Self::SystemStatus),
            117 => Ok(Self::Units),
            120 => Ok(Self::VendorIdentifier),
            121 => Ok(Self::VendorName),
            _ => Err(()),
        }
    }
}

/// A typed BACnet value.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    Null,
    Boolean(bool),
    Unsigned(u32),
    Enumerated(u32),
    Real(f32),
    Text(String),
    BitString(Vec<bool>),
}

/// The two states of a binary point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BinaryPv {
    Inactive = 0,
    Active = 1,
}

impl From<bool> for BinaryPv {
    fn from(value: bool) -> Self {
        if value {
            BinaryPv::Active
        } else {
            BinaryPv::Inactive
        }
    }
}

impl From<BinaryPv> for bool {
    fn from(value: BinaryPv) -> Self {
        value == BinaryPv::Active
    }
}

/// Engineering-units enumeration values used by the GPIO points.
pub mod units {
    pub const DEGREES_CELSIUS: u32 = 62;
    pub const NO_UNITS: u32 = 95;
    pub const PERCENT: u32 = 98;
}

/// One object in the server's table.
///
/// The value class of `present_value` is fixed by the object type:
/// `Enumerated(0|1)` for Binary points, `Real` for Analog points,
/// `Null` for the Device record. Commandable outputs carry the
/// priority array that derives their Present-Value.
#[derive(Debug, Clone)]
pub struct ObjectRecord {
    pub identifier: ObjectIdentifier,
    pub name: String,
    pub present_value: ObjectValue,
    pub active_text: String,
    pub inactive_text: String,
    pub units: u32,
    pub out_of_service: bool,
    pub command: Option<PriorityArray>,
}

impl ObjectRecord {
    fn new(identifier: ObjectIdentifier, name: String, present_value: ObjectValue, units: u32) -> Self {
        let command = identifier
            .object_type
            .is_commandable()
            .then(|| PriorityArray::new(present_value.clone()));
        Self {
            identifier,
            name,
            present_value,
            active_text: "Active".to_string(),
            inactive_text: "Inactive".to_string(),
            units,
            out_of_service: false,
            command,
        }
    }

    pub fn analog_input(instance: u32, name: String, value: f32) -> Self {
        Self::new(
            ObjectIdentifier::new(ObjectType::AnalogInput, instance),
            name,
            ObjectValue::Real(value),
            units::DEGREES_CELSIUS,
        )
    }

    pub fn analog_output(instance: u32, name: String, value: f32) -> Self {
        Self::new(
            ObjectIdentifier::new(ObjectType::AnalogOutput, instance),
            name,
            ObjectValue::Real(value),
            units::DEGREES_CELSIUS,
        )
    }

    pub fn binary_input(instance: u32, name: String, state: BinaryPv) -> Self {
        Self::new(
            ObjectIdentifier::new(ObjectType::BinaryInput, instance),
            name,
            ObjectValue::Enumerated(state as u32),
            units::NO_UNITS,
        )
    }

    pub fn binary_output(instance: u32, name: String, state: BinaryPv) -> Self {
        Self::new(
            ObjectIdentifier::new(ObjectType::BinaryOutput, instance),
            name,
            ObjectValue::Enumerated(state as u32),
            units::NO_UNITS,
        )
    }

    pub fn device(instance: u32, name: String) -> Self {
        Self::new(
            ObjectIdentifier::new(ObjectType::Device, instance),
            name,
            ObjectValue::Null,
            units::NO_UNITS,
        )
    }

    /// True when Present-Value is commanded through the priority array.
    pub fn commandable(&self) -> bool {
        self.command.is_some()
    }

    /// Status flags bit string: in-alarm, fault, overridden always
    /// clear; out-of-service mirrors the record.
    pub fn status_flags(&self) -> [bool; 4] {
        [false, false, false, self.out_of_service]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_conversions() {
        assert_eq!(ObjectType::try_from(4), Ok(ObjectType::BinaryOutput));
        assert_eq!(ObjectType::try_from(8), Ok(ObjectType::Device));
        assert!(ObjectType::try_from(17).is_err());
        assert_eq!(ObjectType::BinaryOutput as u16, 4);
    }

    #[test]
    fn commandable_is_derived_from_type() {
        assert!(ObjectRecord::binary_output(4018, "Test LED".into(), BinaryPv::Inactive).commandable());
        assert!(ObjectRecord::analog_output(2021, "Fan Control".into(), 0.0).commandable());
        assert!(!ObjectRecord::binary_input(3019, "Motion".into(), BinaryPv::Inactive).commandable());
        assert!(!ObjectRecord::analog_input(1020, "Temperature".into(), 20.0).commandable());
        assert!(!ObjectRecord::device(260, "BACnet4Linux".into()).commandable());
    }

    #[test]
    fn binary_points_default_to_no_units() {
        let bo = ObjectRecord::binary_output(4018, "Test LED".into(), BinaryPv::Inactive);
        assert_eq!(bo.units, units::NO_UNITS);
        let ai = ObjectRecord::analog_input(1020, "Temperature".into(), 20.0);
        assert_eq!(ai.units, units::DEGREES_CELSIUS);
    }

    #[test]
    fn status_flags_track_out_of_service() {
        let mut record = ObjectRecord::binary_input(3019, "Motion".into(), BinaryPv::Inactive);
        assert_eq!(record.status_flags(), [false, false, false, false]);
        record.out_of_service = true;
        assert_eq!(record.status_flags(), [false, false, false, true]);
    }

    #[test]
    fn property_identifier_numbers() {
        assert_eq!(PropertyIdentifier::try_from(85), Ok(PropertyIdentifier::PresentValue));
        assert_eq!(PropertyIdentifier::try_from(87), Ok(PropertyIdentifier::PriorityArray));
        assert_eq!(PropertyIdentifier::try_from(104), Ok(PropertyIdentifier::RelinquishDefault));
        assert!(PropertyIdentifier::try_from(9999).is_err());
    }
}
