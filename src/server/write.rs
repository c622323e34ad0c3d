//! WriteProperty dispatch.
//!
//! Routes Present-Value and Relinquish-Default writes through the
//! priority engine of the target record, recomputes the effective
//! value and pushes it to the effector. The priority array commits
//! before hardware is touched, so effector failures are logged and
//! the write still acknowledges.

use log::warn;

use crate::apdu::RequestError;
use crate::effector::{Effector, EffectorValue};
use crate::encoding::decode_value;
use crate::object::commandable::Priority;
use crate::object::store::ObjectStore;
use crate::object::{BinaryPv, ObjectIdentifier, ObjectRecord, ObjectType, ObjectValue, PropertyIdentifier};
use crate::server::property_exists;
use crate::service::WritePropertyRequest;

pub(super) fn dispatch(
    store: &mut ObjectStore,
    effector: &mut dyn Effector,
    request: &WritePropertyRequest,
) -> Result<(), RequestError> {
    // Array-indexed writes are not supported on any property.
    if request.array_index.is_some() {
        return Err(RequestError::PropertyIsNotAList);
    }

    let object_type =
        ObjectType::try_from(request.object_type).map_err(|_| RequestError::UnknownObject)?;
    let identifier = ObjectIdentifier::new(object_type, request.instance);
    let record = store.find_mut(identifier).ok_or(RequestError::UnknownObject)?;
    let property =
        PropertyIdentifier::try_from(request.property).map_err(|_| RequestError::UnknownProperty)?;

    match property {
        PropertyIdentifier::PresentValue if record.commandable() => {
            write_present_value(record, effector, request)
        }
        PropertyIdentifier::RelinquishDefault if record.commandable() => {
            write_relinquish_default(record, effector, request)
        }
        _ if property_exists(object_type, property) => Err(RequestError::WriteAccessDenied),
        _ => Err(RequestError::UnknownProperty),
    }
}

fn write_present_value(
    record: &mut ObjectRecord,
    effector: &mut dyn Effector,
    request: &WritePropertyRequest,
) -> Result<(), RequestError> {
    let priority = match request.priority {
        None => Priority::LOWEST,
        Some(raw) => Priority::new(raw).ok_or(RequestError::ValueOutOfRange)?,
    };
    let value = decode_write_value(record, &request.value)?;

    let command = record.command.as_mut().ok_or(RequestError::WriteAccessDenied)?;
    command.set(priority, value);
    apply_effective(record, effector);
    Ok(())
}

fn write_relinquish_default(
    record: &mut ObjectRecord,
    effector: &mut dyn Effector,
    request: &WritePropertyRequest,
) -> Result<(), RequestError> {
    let value = decode_write_value(record, &request.value)?;
    if matches!(value, ObjectValue::Null) {
        return Err(RequestError::InvalidDataType);
    }

    let command = record.command.as_mut().ok_or(RequestError::WriteAccessDenied)?;
    command.set_relinquish_default(value);
    apply_effective(record, effector);
    Ok(())
}

/// Decode exactly one application-tagged value and check its class
/// against the record's value class. `Null` is always admissible; the
/// callers decide what it means.
fn decode_write_value(record: &ObjectRecord, raw: &[u8]) -> Result<ObjectValue, RequestError> {
    let (consumed, value) = decode_value(raw).map_err(|_| RequestError::InvalidDataType)?;
    if consumed != raw.len() {
        return Err(RequestError::InvalidDataType);
    }
    let object_type = record.identifier.object_type;
    match &value {
        ObjectValue::Null => Ok(value),
        ObjectValue::Enumerated(state) if object_type.is_binary() => {
            if *state > 1 {
                return Err(RequestError::ValueOutOfRange);
            }
            Ok(value)
        }
        ObjectValue::Real(_) if object_type.is_analog() => Ok(value),
        _ => Err(RequestError::InvalidDataType),
    }
}

/// Recompute the effective Present-Value and drive the effector. Out
/// of service, the record holds its local value and hardware is left
/// alone; the slot mutation above still answers SimpleACK.
fn apply_effective(record: &mut ObjectRecord, effector: &mut dyn Effector) {
    let Some(command) = record.command.as_ref() else { return };
    if record.out_of_service {
        return;
    }
    let effective = command.resolve().clone();
    let hardware = match &effective {
        ObjectValue::Enumerated(state) => Some(EffectorValue::Binary(BinaryPv::from(*state != 0))),
        ObjectValue::Real(value) => Some(EffectorValue::Analog(*value)),
        other => {
            warn!("effective value {other:?} for {:?} has no hardware form", record.identifier);
            None
        }
    };
    record.present_value = effective;
    let Some(hardware) = hardware else { return };
    if let Err(err) = effector.write(record.identifier.instance, hardware) {
        // Hardware trouble never becomes a BACnet error.
        warn!("effector write failed for {:?}: {err}", record.identifier);
    }
}
