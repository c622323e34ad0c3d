//! ReadProperty dispatch.
//!
//! Encodes the ComplexACK for a ReadProperty request directly into the
//! response buffer: the three-octet PDU header, the echoed `[0]`
//! object id, `[1]` property id and optional `[2]` array index, then
//! the property value between `[3]` brackets. Device properties and
//! point properties take separate paths; commandable properties
//! delegate to the record's priority array.

use chrono::{Datelike, Local, Timelike};

use crate::apdu::{Apdu, RequestError};
use crate::encoding::{
    encode_bit_string, encode_boolean, encode_character_string, encode_closing_tag,
    encode_context_enumerated, encode_context_object_id, encode_context_unsigned, encode_date,
    encode_enumerated, encode_object_id, encode_opening_tag, encode_time, encode_unsigned,
    encode_value,
};
use crate::object::commandable::{Priority, PRIORITY_SLOTS};
use crate::object::store::ObjectStore;
use crate::object::{ObjectIdentifier, ObjectRecord, ObjectType, PropertyIdentifier};
use crate::server::{property_exists, DeviceConfig, DEVICE_DESCRIPTION, DEVICE_NAME, PROGRAM_VERSION, VENDOR_NAME};
use crate::service::{ConfirmedServiceChoice, ReadPropertyRequest};

/// Bit positions in protocol-services-supported.
const SERVICE_BIT_CONFIRMED_COV_NOTIFICATION: usize = 1;
const SERVICE_BIT_READ_PROPERTY: usize = 12;
const SERVICE_BIT_WRITE_PROPERTY: usize = 15;
const SERVICE_BIT_I_AM: usize = 26;
const SERVICE_BIT_TIME_SYNCHRONIZATION: usize = 32;
const SERVICE_BIT_WHO_IS: usize = 34;
const SERVICES_SUPPORTED_BITS: usize = 35;

/// Bit string width of protocol-object-types-supported.
const OBJECT_TYPES_SUPPORTED_BITS: usize = 23;

/// System-status value reported by the Device object.
const STATUS_OPERATIONAL_READ_ONLY: u32 = 1;

/// Segmentation-supported value: no segmentation in either direction.
const SEGMENTATION_NONE: u32 = 3;

/// Build the complete ComplexACK, returning its length.
pub(super) fn dispatch(
    store: &ObjectStore,
    device: &DeviceConfig,
    request: &ReadPropertyRequest,
    invoke_id: u8,
    buf: &mut [u8],
) -> Result<usize, RequestError> {
    let object_type =
        ObjectType::try_from(request.object_type).map_err(|_| RequestError::UnknownObject)?;
    let property =
        PropertyIdentifier::try_from(request.property).map_err(|_| RequestError::UnknownProperty)?;
    if !property_exists(object_type, property) {
        return Err(RequestError::UnknownProperty);
    }

    let header = Apdu::ComplexAck {
        invoke_id,
        service_choice: ConfirmedServiceChoice::ReadProperty as u8,
    };
    let mut len = header.encode(buf)?;
    len += encode_context_object_id(&mut buf[len..], 0, request.object_type, request.instance)?;
    len += encode_context_enumerated(&mut buf[len..], 1, request.property)?;
    if let Some(index) = request.array_index {
        len += encode_context_unsigned(&mut buf[len..], 2, index)?;
    }
    len += encode_opening_tag(&mut buf[len..], 3)?;

    len += if object_type == ObjectType::Device && request.instance == device.instance {
        encode_device_property(store, device, property, request.array_index, &mut buf[len..])?
    } else {
        let identifier = ObjectIdentifier::new(object_type, request.instance);
        let record = store.find(identifier).ok_or(RequestError::UnknownObject)?;
        encode_point_property(record, property, request.array_index, &mut buf[len..])?
    };

    len += encode_closing_tag(&mut buf[len..], 3)?;
    Ok(len)
}

/// Properties of the Device object.
fn encode_device_property(
    store: &ObjectStore,
    device: &DeviceConfig,
    property: PropertyIdentifier,
    array_index: Option<u32>,
    buf: &mut [u8],
) -> Result<usize, RequestError> {
    if array_index.is_some() && property != PropertyIdentifier::ObjectList {
        return Err(RequestError::PropertyIsNotAList);
    }
    let len = match property {
        PropertyIdentifier::ObjectIdentifier => {
            encode_object_id(buf, ObjectType::Device as u16, device.instance)?
        }
        PropertyIdentifier::ObjectName => encode_character_string(buf, DEVICE_NAME)?,
        PropertyIdentifier::ObjectType => encode_enumerated(buf, ObjectType::Device as u32)?,
        PropertyIdentifier::Description => encode_character_string(buf, DEVICE_DESCRIPTION)?,
        PropertyIdentifier::SystemStatus => encode_enumerated(buf, STATUS_OPERATIONAL_READ_ONLY)?,
        PropertyIdentifier::VendorName => encode_character_string(buf, VENDOR_NAME)?,
        PropertyIdentifier::VendorIdentifier => encode_unsigned(buf, device.vendor_identifier)?,
        PropertyIdentifier::ModelName => encode_character_string(buf, DEVICE_NAME)?,
        PropertyIdentifier::FirmwareRevision => encode_character_string(buf, PROGRAM_VERSION)?,
        PropertyIdentifier::ApplicationSoftwareVersion => {
            encode_character_string(buf, PROGRAM_VERSION)?
        }
        PropertyIdentifier::LocalTime => {
            let now = Local::now();
            encode_time(buf, now.hour() as u8, now.minute() as u8, now.second() as u8, 0)?
        }
        PropertyIdentifier::LocalDate => {
            let now = Local::now();
            encode_date(
                buf,
                now.year() as u16,
                now.month() as u8,
                now.day() as u8,
                now.weekday().number_from_monday() as u8,
            )?
        }
        PropertyIdentifier::ProtocolVersion => {
            encode_unsigned(buf, crate::PROTOCOL_VERSION as u32)?
        }
        PropertyIdentifier::ProtocolConformanceClass => encode_unsigned(buf, 1)?,
        PropertyIdentifier::ProtocolServicesSupported => {
            let mut bits = [false; SERVICES_SUPPORTED_BITS];
            bits[SERVICE_BIT_WHO_IS] = true;
            bits[SERVICE_BIT_I_AM] = true;
            bits[SERVICE_BIT_READ_PROPERTY] = true;
            bits[SERVICE_BIT_WRITE_PROPERTY] = true;
            bits[SERVICE_BIT_TIME_SYNCHRONIZATION] = device.time_sync;
            bits[SERVICE_BIT_CONFIRMED_COV_NOTIFICATION] = device.cov;
            encode_bit_string(buf, &bits)?
        }
        PropertyIdentifier::ProtocolObjectTypesSupported => {
            let mut bits = [false; OBJECT_TYPES_SUPPORTED_BITS];
            for object_type in [
                ObjectType::AnalogInput,
                ObjectType::AnalogOutput,
                ObjectType::BinaryInput,
                ObjectType::BinaryOutput,
                ObjectType::Device,
            ] {
                bits[object_type as usize] = true;
            }
            encode_bit_string(buf, &bits)?
        }
        PropertyIdentifier::ObjectList => return encode_object_list(store, array_index, buf),
        PropertyIdentifier::MaxApduLengthAccepted => {
            encode_unsigned(buf, device.max_apdu as u32)?
        }
        PropertyIdentifier::SegmentationSupported => encode_enumerated(buf, SEGMENTATION_NONE)?,
        PropertyIdentifier::ApduTimeout => {
            encode_unsigned(buf, device.apdu_timeout_seconds * 1000)?
        }
        PropertyIdentifier::NumberOfApduRetries => encode_unsigned(buf, 1)?,
        _ => return Err(RequestError::UnknownProperty),
    };
    Ok(len)
}

/// object-list: index 0 is the size, index i the i-th identifier in
/// store order, no index the whole array.
fn encode_object_list(
    store: &ObjectStore,
    array_index: Option<u32>,
    buf: &mut [u8],
) -> Result<usize, RequestError> {
    match array_index {
        None => {
            let mut len = 0;
            for identifier in store.identifiers() {
                len += encode_object_id(
                    &mut buf[len..],
                    identifier.object_type as u16,
                    identifier.instance,
                )?;
            }
            Ok(len)
        }
        Some(0) => Ok(encode_unsigned(buf, store.count() as u32)?),
        Some(index) => {
            let identifier = store
                .identifier_at(index as usize)
                .ok_or(RequestError::InvalidArrayIndex)?;
            Ok(encode_object_id(buf, identifier.object_type as u16, identifier.instance)?)
        }
    }
}

/// Properties of the GPIO point records.
fn encode_point_property(
    record: &ObjectRecord,
    property: PropertyIdentifier,
    array_index: Option<u32>,
    buf: &mut [u8],
) -> Result<usize, RequestError> {
    if array_index.is_some() && property != PropertyIdentifier::PriorityArray {
        return Err(RequestError::PropertyIsNotAList);
    }
    let len = match property {
        PropertyIdentifier::ObjectIdentifier => encode_object_id(
            buf,
            record.identifier.object_type as u16,
            record.identifier.instance,
        )?,
        PropertyIdentifier::ObjectName => encode_character_string(buf, &record.name)?,
        PropertyIdentifier::ObjectType => {
            encode_enumerated(buf, record.identifier.object_type as u32)?
        }
        PropertyIdentifier::PresentValue => encode_value(buf, &record.present_value)?,
        PropertyIdentifier::StatusFlags => encode_bit_string(buf, &record.status_flags())?,
        PropertyIdentifier::OutOfService => encode_boolean(buf, record.out_of_service)?,
        PropertyIdentifier::Units => encode_enumerated(buf, record.units)?,
        PropertyIdentifier::ActiveText => encode_character_string(buf, &record.active_text)?,
        PropertyIdentifier::InactiveText => encode_character_string(buf, &record.inactive_text)?,
        PropertyIdentifier::PriorityArray => {
            let command = record.command.as_ref().ok_or(RequestError::UnknownProperty)?;
            return encode_priority_array(command.slots(), array_index, buf);
        }
        PropertyIdentifier::RelinquishDefault => {
            let command = record.command.as_ref().ok_or(RequestError::UnknownProperty)?;
            encode_value(buf, command.relinquish_default())?
        }
        _ => return Err(RequestError::UnknownProperty),
    };
    Ok(len)
}

/// priority-array: index 0 is the fixed size 16, index 1..=16 a single
/// slot, no index all 16 tagged elements.
fn encode_priority_array(
    slots: &[crate::object::ObjectValue; PRIORITY_SLOTS],
    array_index: Option<u32>,
    buf: &mut [u8],
) -> Result<usize, RequestError> {
    match array_index {
        None => {
            let mut len = 0;
            for slot in slots {
                len += encode_value(&mut buf[len..], slot)?;
            }
            Ok(len)
        }
        Some(0) => Ok(encode_unsigned(buf, PRIORITY_SLOTS as u32)?),
        Some(index) => {
            let priority = Priority::new(index).ok_or(RequestError::InvalidArrayIndex)?;
            Ok(encode_value(buf, &slots[usize::from(priority.get()) - 1])?)
        }
    }
}

