//! APDU response framing.
//!
//! The link layer cracks incoming confirmed-request headers before the
//! core sees them, so this module only builds the four response
//! shapes: ComplexACK (0x30) for reads, SimpleACK (0x20) for writes,
//! Error (0x50) for typed failures and Abort (0x70) for everything the
//! server cannot answer. It also owns the bounded pool that response
//! buffers are drawn from.

use bytes::BytesMut;
use thiserror::Error;

use crate::encoding::{self, EncodeError};
use crate::MAX_APDU;

/// APDU type nibbles (bits 7-4 of the first octet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApduType {
    ConfirmedRequest = 0,
    UnconfirmedRequest = 1,
    SimpleAck = 2,
    ComplexAck = 3,
    SegmentAck = 4,
    Error = 5,
    Reject = 6,
    Abort = 7,
}

/// BACnet error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorClass {
    Device = 0,
    Object = 1,
    Property = 2,
    Resources = 3,
    Security = 4,
    Services = 5,
}

/// BACnet error codes used by this server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    InvalidDataType = 9,
    MissingRequiredParameter = 16,
    PropertyIsNotAList = 22,
    UnknownObject = 31,
    UnknownProperty = 32,
    ValueOutOfRange = 37,
    WriteAccessDenied = 40,
    InvalidArrayIndex = 42,
}

/// Abort reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AbortReason {
    Other = 0,
    BufferOverflow = 1,
    InvalidApduInThisState = 2,
    PreemptedByHigherPriorityTask = 3,
    SegmentationNotSupported = 4,
}

/// Everything that can go wrong while answering a confirmed request,
/// with its wire representation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RequestError {
    #[error("unknown object")]
    UnknownObject,
    #[error("unknown property")]
    UnknownProperty,
    #[error("invalid array index")]
    InvalidArrayIndex,
    #[error("invalid data type for property")]
    InvalidDataType,
    #[error("value out of range")]
    ValueOutOfRange,
    #[error("write access denied")]
    WriteAccessDenied,
    #[error("missing required parameter")]
    MissingParameter,
    #[error("array index on a non-array property")]
    PropertyIsNotAList,
    #[error("abort: {0:?}")]
    Abort(AbortReason),
}

impl RequestError {
    /// The `(error-class, error-code)` pair for typed errors; `None`
    /// for the abort variants, which use a different PDU.
    pub fn error_pair(&self) -> Option<(ErrorClass, ErrorCode)> {
        match self {
            RequestError::UnknownObject => Some((ErrorClass::Object, ErrorCode::UnknownObject)),
            RequestError::UnknownProperty => Some((ErrorClass::Property, ErrorCode::UnknownProperty)),
            RequestError::InvalidArrayIndex => Some((ErrorClass::Property, ErrorCode::InvalidArrayIndex)),
            RequestError::InvalidDataType => Some((ErrorClass::Property, ErrorCode::InvalidDataType)),
            RequestError::ValueOutOfRange => Some((ErrorClass::Property, ErrorCode::ValueOutOfRange)),
            RequestError::WriteAccessDenied => Some((ErrorClass::Property, ErrorCode::WriteAccessDenied)),
            RequestError::MissingParameter => {
                Some((ErrorClass::Services, ErrorCode::MissingRequiredParameter))
            }
            RequestError::PropertyIsNotAList => {
                Some((ErrorClass::Services, ErrorCode::PropertyIsNotAList))
            }
            RequestError::Abort(_) => None,
        }
    }
}

impl From<EncodeError> for RequestError {
    fn from(err: EncodeError) -> Self {
        match err {
            // The response outgrew the APDU buffer and this server
            // does not segment.
            EncodeError::Overflow => RequestError::Abort(AbortReason::SegmentationNotSupported),
            EncodeError::ValueOutOfRange => RequestError::Abort(AbortReason::Other),
        }
    }
}

/// A response APDU. `ComplexAck` encodes only the three-octet header;
/// the service body is appended by the property dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Apdu {
    SimpleAck {
        invoke_id: u8,
        service_choice: u8,
    },
    ComplexAck {
        invoke_id: u8,
        service_choice: u8,
    },
    Error {
        invoke_id: u8,
        service_choice: u8,
        error_class: ErrorClass,
        error_code: ErrorCode,
    },
    Abort {
        server: bool,
        invoke_id: u8,
        reason: AbortReason,
    },
}

impl Apdu {
    /// Encode into a caller-supplied buffer, returning bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        match *self {
            Apdu::SimpleAck { invoke_id, service_choice } => {
                if buf.len() < 3 {
                    return Err(EncodeError::Overflow);
                }
                buf[0] = (ApduType::SimpleAck as u8) << 4;
                buf[1] = invoke_id;
                buf[2] = service_choice;
                Ok(3)
            }
            Apdu::ComplexAck { invoke_id, service_choice } => {
                if buf.len() < 3 {
                    return Err(EncodeError::Overflow);
                }
                buf[0] = (ApduType::ComplexAck as u8) << 4;
                buf[1] = invoke_id;
                buf[2] = service_choice;
                Ok(3)
            }
            Apdu::Error { invoke_id, service_choice, error_class, error_code } => {
                if buf.len() < 3 {
                    return Err(EncodeError::Overflow);
                }
                buf[0] = (ApduType::Error as u8) << 4;
                buf[1] = invoke_id;
                buf[2] = service_choice;
                let mut len = 3;
                len += encoding::encode_enumerated(&mut buf[len..], error_class as u32)?;
                len += encoding::encode_enumerated(&mut buf[len..], error_code as u32)?;
                Ok(len)
            }
            Apdu::Abort { server, invoke_id, reason } => {
                if buf.len() < 3 {
                    return Err(EncodeError::Overflow);
                }
                buf[0] = ((ApduType::Abort as u8) << 4) | u8::from(server);
                buf[1] = invoke_id;
                buf[2] = reason as u8;
                Ok(3)
            }
        }
    }
}

/// Bounded pool of response buffers. Framing acquires a buffer at the
/// start of a response and releases it on every exit path; running dry
/// is reported upstream as Abort/other.
#[derive(Debug)]
pub struct ApduPool {
    free: Vec<BytesMut>,
    outstanding: usize,
    limit: usize,
}

impl ApduPool {
    pub fn new(limit: usize) -> Self {
        Self { free: Vec::with_capacity(limit), outstanding: 0, limit }
    }

    /// A zeroed `MAX_APDU`-sized buffer, or `None` when the pool is dry.
    pub fn acquire(&mut self) -> Option<BytesMut> {
        if self.outstanding >= self.limit {
            return None;
        }
        self.outstanding += 1;
        let mut buf = self.free.pop().unwrap_or_else(|| BytesMut::with_capacity(MAX_APDU));
        buf.clear();
        buf.resize(MAX_APDU, 0);
        Some(buf)
    }

    pub fn release(&mut self, buf: BytesMut) {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.free.len() < self.limit {
            self.free.push(buf);
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl Default for ApduPool {
    fn default() -> Self {
        Self::new(8)
    }
}
