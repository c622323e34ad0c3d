//! Confirmed service request shapes.
//!
//! ReadProperty and WriteProperty are the two confirmed services this
//! server answers. Requests arrive as the raw service portion of a
//! confirmed-request APDU (the link layer has already consumed the
//! PDU header and invoke id); decoding here turns the context-tagged
//! stream into typed request structs. Object types and property
//! identifiers stay raw integers at this layer so that an unknown
//! type or property reaches the dispatcher, which answers with the
//! proper typed error instead of an abort.

use thiserror::Error;

use crate::encoding::{
    self, decode_context_enumerated, decode_context_object_id, decode_context_unsigned,
    decode_opening_tag, decode_tag, DecodeError, EncodeError,
};

/// Array-index wildcard meaning "the whole array".
pub const BACNET_ARRAY_ALL: u32 = 0xFFFF_FFFF;

/// Confirmed service choices the server implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfirmedServiceChoice {
    ReadProperty = 12,
    WriteProperty = 15,
}

impl TryFrom<u8> for ConfirmedServiceChoice {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            12 => Ok(Self::ReadProperty),
            15 => Ok(Self::WriteProperty),
            _ => Err(()),
        }
    }
}

/// Request decoding failures, split so the server can answer a clean
/// omission with a typed error and a mangled stream with an abort.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ServiceDecodeError {
    /// The stream is well formed but a required operand is absent.
    #[error("required service parameter missing")]
    MissingParameter,
    /// The tag stream itself is broken.
    #[error(transparent)]
    Tagging(#[from] DecodeError),
}

/// ReadProperty request: `[0]` object id, `[1]` property id, optional
/// `[2]` array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPropertyRequest {
    pub object_type: u16,
    pub instance: u32,
    pub property: u32,
    /// Normalized: the ALL wildcard decodes as `None`.
    pub array_index: Option<u32>,
}

impl ReadPropertyRequest {
    pub fn decode(data: &[u8]) -> Result<Self, ServiceDecodeError> {
        let mut pos = 0;
        let (consumed, (object_type, instance)) =
            decode_context_object_id(data, 0).map_err(map_leading(data))?;
        pos += consumed;

        if pos >= data.len() {
            return Err(ServiceDecodeError::MissingParameter);
        }
        let (consumed, property) = decode_context_enumerated(&data[pos..], 1)?;
        pos += consumed;

        let mut array_index = None;
        if pos < data.len() {
            let (consumed, index) = decode_context_unsigned(&data[pos..], 2)?;
            pos += consumed;
            if index != BACNET_ARRAY_ALL {
                array_index = Some(index);
            }
        }

        if pos != data.len() {
            return Err(DecodeError::InvalidTag.into());
        }
        Ok(Self { object_type, instance, property, array_index })
    }

    /// Encode the request body (used by tests and client tooling).
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        let mut len = encoding::encode_context_object_id(buf, 0, self.object_type, self.instance)?;
        len += encoding::encode_context_enumerated(&mut buf[len..], 1, self.property)?;
        if let Some(index) = self.array_index {
            len += encoding::encode_context_unsigned(&mut buf[len..], 2, index)?;
        }
        Ok(len)
    }
}

/// WriteProperty request: `[0]` object id, `[1]` property id, optional
/// `[2]` array index, `[3]` bracketed value, optional `[4]` priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WritePropertyRequest {
    pub object_type: u16,
    pub instance: u32,
    pub property: u32,
    /// Normalized: the ALL wildcard decodes as `None`.
    pub array_index: Option<u32>,
    /// Raw application-tagged bytes between the `[3]` brackets.
    pub value: Vec<u8>,
    /// Raw priority operand; range checking happens at dispatch.
    pub priority: Option<u32>,
}

impl WritePropertyRequest {
    pub fn decode(data: &[u8]) -> Result<Self, ServiceDecodeError> {
        let mut pos = 0;
        let (consumed, (object_type, instance)) =
            decode_context_object_id(data, 0).map_err(map_leading(data))?;
        pos += consumed;

        if pos >= data.len() {
            return Err(ServiceDecodeError::MissingParameter);
        }
        let (consumed, property) = decode_context_enumerated(&data[pos..], 1)?;
        pos += consumed;

        let mut array_index = None;
        if let Ok((consumed, index)) = decode_context_unsigned(&data[pos..], 2) {
            pos += consumed;
            if index != BACNET_ARRAY_ALL {
                array_index = Some(index);
            }
        }

        if pos >= data.len() {
            return Err(ServiceDecodeError::MissingParameter);
        }
        pos += decode_opening_tag(&data[pos..], 3)?;

        // Walk complete elements until the matching closing tag so a
        // 0x3F octet inside a payload cannot end the value early.
        let value_start = pos;
        loop {
            if pos >= data.len() {
                return Err(DecodeError::Truncated.into());
            }
            let (_, tag) = decode_tag(&data[pos..])?;
            if tag.is_closing(3) {
                break;
            }
            pos += encoding::skip_element(&data[pos..])?;
        }
        let value = data[value_start..pos].to_vec();
        if value.is_empty() {
            return Err(ServiceDecodeError::MissingParameter);
        }
        pos += 1; // closing [3]

        let mut priority = None;
        if pos < data.len() {
            let (consumed, raw) = decode_context_unsigned(&data[pos..], 4)?;
            pos += consumed;
            priority = Some(raw);
        }

        if pos != data.len() {
            return Err(DecodeError::InvalidTag.into());
        }
        Ok(Self { object_type, instance, property, array_index, value, priority })
    }

    /// Encode the request body (used by tests and client tooling).
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        let mut len = encoding::encode_context_object_id(buf, 0, self.object_type, self.instance)?;
        len += encoding::encode_context_enumerated(&mut buf[len..], 1, self.property)?;
        if let Some(index) = self.array_index {
            len += encoding::encode_context_unsigned(&mut buf[len..], 2, index)?;
        }
        len += encoding::encode_opening_tag(&mut buf[len..], 3)?;
        if buf.len() < len + self.value.len() {
            return Err(EncodeError::Overflow);
        }
        buf[len..len + self.value.len()].copy_from_slice(&self.value);
        len += self.value.len();
        len += encoding::encode_closing_tag(&mut buf[len..], 3)?;
        if let Some(priority) = self.priority {
            len += encoding::encode_context_unsigned(&mut buf[len..], 4, priority)?;
        }
        Ok(len)
    }
}

/// An empty body is a missing object id; a present-but-wrong leading
/// tag is a malformed stream.
fn map_leading(data: &[u8]) -> impl Fn(DecodeError) -> ServiceDecodeError + '_ {
    move |err| {
        if data.is_empty() {
            ServiceDecodeError::MissingParameter
        } else {
            ServiceDecodeError::Tagging(err)
        }
    }
}
