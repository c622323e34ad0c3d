//! The BACnet server core.
//!
//! A [`Server`] owns the object store, the device identity, the
//! hardware effector and the response buffer pool; the link layer
//! drives it one confirmed request at a time. Handlers borrow the
//! server exclusively, so the core needs no locking.
//!
//! [`Server::handle_request`] consumes `(invoke-id, service-choice,
//! service-request-bytes, peer-max-apdu)` and yields the response
//! APDU bytes for the same peer, or `None` for service data the
//! server must stay silent on. The invoke id of every response echoes
//! the request verbatim; the core keeps no per-invoke state.

mod read;
mod write;

use bytes::{Bytes, BytesMut};
use log::{trace, warn};

use crate::apdu::{AbortReason, Apdu, ApduPool, RequestError};
use crate::effector::{Effector, EffectorValue};
use crate::object::store::{DuplicateObject, ObjectStore};
use crate::object::{ObjectIdentifier, ObjectRecord, ObjectType, ObjectValue, PropertyIdentifier};
use crate::service::{
    ConfirmedServiceChoice, ReadPropertyRequest, ServiceDecodeError, WritePropertyRequest,
};

/// Fixed identity strings reported by the Device object.
pub const DEVICE_NAME: &str = "BACnet4Linux";
pub const VENDOR_NAME: &str = "GNU";
pub const DEVICE_DESCRIPTION: &str = "BACnet Stack for Linux";

pub(crate) const PROGRAM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configured identity of the Device object.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub instance: u32,
    pub vendor_identifier: u32,
    /// Reported as max-apdu-length-accepted.
    pub max_apdu: u16,
    /// Reported as apdu-timeout, in seconds; the wire value is ms.
    pub apdu_timeout_seconds: u32,
    /// Advertise time-synchronization in protocol-services-supported.
    pub time_sync: bool,
    /// Advertise confirmed-cov-notification in protocol-services-supported.
    pub cov: bool,
}

impl DeviceConfig {
    pub fn new(instance: u32) -> Self {
        Self {
            instance,
            vendor_identifier: 0,
            max_apdu: crate::MAX_APDU as u16,
            apdu_timeout_seconds: 3,
            time_sync: false,
            cov: false,
        }
    }
}

/// The object/property server.
pub struct Server {
    store: ObjectStore,
    device: DeviceConfig,
    effector: Box<dyn Effector>,
    pool: ApduPool,
}

impl Server {
    /// A server with only its Device object. Points come from the
    /// bootstrap via [`Server::add_point`].
    pub fn new(device: DeviceConfig, effector: Box<dyn Effector>) -> Self {
        let mut store = ObjectStore::new();
        store
            .insert(ObjectRecord::device(device.instance, DEVICE_NAME.to_string()))
            .expect("empty store cannot hold a duplicate");
        Self { store, device, effector, pool: ApduPool::default() }
    }

    /// Add a point record during initialization.
    pub fn add_point(&mut self, record: ObjectRecord) -> Result<(), DuplicateObject> {
        self.store.insert(record)
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    pub fn object_count(&self) -> usize {
        self.store.count()
    }

    /// Host-side out-of-service control. While set, the record holds
    /// its locally written value: priority writes are recorded but do
    /// not drive Present-Value or the effector.
    pub fn set_out_of_service(&mut self, identifier: ObjectIdentifier, out_of_service: bool) -> bool {
        match self.store.find_mut(identifier) {
            Some(record) => {
                record.out_of_service = out_of_service;
                if !out_of_service {
                    // Back in service, Present-Value tracks the resolver again.
                    if let Some(command) = record.command.as_ref() {
                        record.present_value = command.resolve().clone();
                    }
                }
                true
            }
            None => false,
        }
    }

    /// Answer one confirmed service request.
    pub fn handle_request(
        &mut self,
        invoke_id: u8,
        service_choice: u8,
        data: &[u8],
        peer_max_apdu: usize,
    ) -> Option<Bytes> {
        trace!(
            "confirmed request invoke {invoke_id} service {service_choice} body {}",
            hex::encode(data)
        );

        let Some(buf) = self.pool.acquire() else {
            warn!("apdu pool exhausted, aborting invoke {invoke_id}");
            return Some(abort_bytes(invoke_id, AbortReason::Other));
        };

        let Ok(service) = ConfirmedServiceChoice::try_from(service_choice) else {
            self.pool.release(buf);
            return Some(abort_bytes(invoke_id, AbortReason::Other));
        };

        let response = match service {
            ConfirmedServiceChoice::ReadProperty => self.read_property(invoke_id, data, buf),
            ConfirmedServiceChoice::WriteProperty => self.write_property(invoke_id, data, buf),
        };

        match response {
            Some(apdu) if apdu.len() > peer_max_apdu => {
                Some(abort_bytes(invoke_id, AbortReason::SegmentationNotSupported))
            }
            other => other,
        }
    }

    fn read_property(&mut self, invoke_id: u8, data: &[u8], mut buf: BytesMut) -> Option<Bytes> {
        let service = ConfirmedServiceChoice::ReadProperty as u8;
        let request = match ReadPropertyRequest::decode(data) {
            Ok(request) => request,
            Err(err) => return Some(self.fail(invoke_id, service, buf, err.into())),
        };
        match read::dispatch(&self.store, &self.device, &request, invoke_id, &mut buf) {
            Ok(len) => Some(self.finish(buf, len)),
            Err(err) => Some(self.fail(invoke_id, service, buf, err)),
        }
    }

    fn write_property(&mut self, invoke_id: u8, data: &[u8], mut buf: BytesMut) -> Option<Bytes> {
        let service = ConfirmedServiceChoice::WriteProperty as u8;
        let request = match WritePropertyRequest::decode(data) {
            Ok(request) => request,
            Err(err) => return Some(self.fail(invoke_id, service, buf, err.into())),
        };
        match write::dispatch(&mut self.store, self.effector.as_mut(), &request) {
            Ok(()) => {
                let ack = Apdu::SimpleAck { invoke_id, service_choice: service };
                match ack.encode(&mut buf) {
                    Ok(len) => Some(self.finish(buf, len)),
                    Err(err) => Some(self.fail(invoke_id, service, buf, err.into())),
                }
            }
            Err(err) => Some(self.fail(invoke_id, service, buf, err)),
        }
    }

    /// Frame a typed error or abort into the held buffer.
    fn fail(&mut self, invoke_id: u8, service_choice: u8, mut buf: BytesMut, err: RequestError) -> Bytes {
        let apdu = match err.error_pair() {
            Some((error_class, error_code)) => {
                Apdu::Error { invoke_id, service_choice, error_class, error_code }
            }
            None => {
                let reason = match err {
                    RequestError::Abort(reason) => reason,
                    _ => AbortReason::Other,
                };
                Apdu::Abort { server: true, invoke_id, reason }
            }
        };
        match apdu.encode(&mut buf) {
            Ok(len) => self.finish(buf, len),
            Err(_) => {
                // A 3-byte abort always fits MAX_APDU; fall back anyway.
                self.pool.release(buf);
                abort_bytes(invoke_id, AbortReason::Other)
            }
        }
    }

    fn finish(&mut self, buf: BytesMut, len: usize) -> Bytes {
        let out = Bytes::copy_from_slice(&buf[..len]);
        self.pool.release(buf);
        trace!("response {}", hex::encode(&out));
        out
    }

    /// Refresh every in-service input record from the effector. Read
    /// failures and class mismatches are logged and leave the stored
    /// value unchanged.
    pub fn poll_inputs(&mut self) {
        let inputs: Vec<ObjectIdentifier> = self
            .store
            .identifiers()
            .filter(|id| id.object_type.is_input())
            .collect();
        for identifier in inputs {
            let Some(record) = self.store.find_mut(identifier) else { continue };
            if record.out_of_service {
                continue;
            }
            match self.effector.read(identifier.instance) {
                Ok(EffectorValue::Binary(state)) if identifier.object_type.is_binary() => {
                    record.present_value = ObjectValue::Enumerated(state as u32);
                }
                Ok(EffectorValue::Analog(value)) if identifier.object_type.is_analog() => {
                    record.present_value = ObjectValue::Real(value);
                }
                Ok(other) => {
                    warn!("effector returned {other:?} for {identifier:?}, class mismatch");
                }
                Err(err) => {
                    warn!("effector read failed for {identifier:?}: {err}");
                }
            }
        }
    }
}

/// Whether a property exists at all on the given object type; used to
/// pick between write-access-denied and unknown-property on writes.
pub(crate) fn property_exists(object_type: ObjectType, property: PropertyIdentifier) -> bool {
    use PropertyIdentifier as Prop;
    match object_type {
        ObjectType::Device => matches!(
            property,
            Prop::ObjectIdentifier
                | Prop::ObjectName
                | Prop::ObjectType
                | Prop::Description
                | Prop::SystemStatus
                | Prop::VendorName
                | Prop::VendorIdentifier
                | Prop::ModelName
                | Prop::FirmwareRevision
                | Prop::ApplicationSoftwareVersion
                | Prop::LocalTime
                | Prop::LocalDate
                | Prop::ProtocolVersion
                | Prop::ProtocolConformanceClass
                | Prop::ProtocolServicesSupported
                | Prop::ProtocolObjectTypesSupported
                | Prop::ObjectList
                | Prop::MaxApduLengthAccepted
                | Prop::SegmentationSupported
                | Prop::ApduTimeout
                | Prop::NumberOfApduRetries
        ),
        ObjectType::AnalogInput => matches!(
            property,
            Prop::ObjectIdentifier
                | Prop::ObjectName
                | Prop::ObjectType
                | Prop::PresentValue
                | Prop::StatusFlags
                | Prop::OutOfService
                | Prop::Units
        ),
        ObjectType::BinaryInput => matches!(
            property,
            Prop::ObjectIdentifier
                | Prop::ObjectName
                | Prop::ObjectType
                | Prop::PresentValue
                | Prop::StatusFlags
                | Prop::OutOfService
                | Prop::Units
                | Prop::ActiveText
                | Prop::InactiveText
        ),
        ObjectType::AnalogOutput => matches!(
            property,
            Prop::ObjectIdentifier
                | Prop::ObjectName
                | Prop::ObjectType
                | Prop::PresentValue
                | Prop::StatusFlags
                | Prop::OutOfService
                | Prop::Units
                | Prop::PriorityArray
                | Prop::RelinquishDefault
        ),
        ObjectType::BinaryOutput => matches!(
            property,
            Prop::ObjectIdentifier
                | Prop::ObjectName
                | Prop::ObjectType
                | Prop::PresentValue
                | Prop::StatusFlags
                | Prop::OutOfService
                | Prop::Units
                | Prop::ActiveText
                | Prop::InactiveText
                | Prop::PriorityArray
                | Prop::RelinquishDefault
        ),
    }
}

impl From<ServiceDecodeError> for RequestError {
    fn from(err: ServiceDecodeError) -> Self {
        match err {
            ServiceDecodeError::MissingParameter => RequestError::MissingParameter,
            ServiceDecodeError::Tagging(_) => RequestError::Abort(AbortReason::Other),
        }
    }
}

fn abort_bytes(invoke_id: u8, reason: AbortReason) -> Bytes {
    let mut buf = [0u8; 3];
    let apdu = Apdu::Abort { server: true, invoke_id, reason };
    let len = apdu.encode(&mut buf).expect("abort fits a 3-byte buffer");
    Bytes::copy_from_slice(&buf[..len])
}
