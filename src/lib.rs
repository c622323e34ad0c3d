#![doc = include_str!("../README.md")]

pub mod apdu;
pub mod config;
pub mod effector;
pub mod encoding;
pub mod object;
pub mod server;
pub mod service;

// Re-export main types without glob imports to avoid conflicts
pub use apdu::{AbortReason, Apdu, ErrorClass, ErrorCode, RequestError};
pub use config::BootstrapConfig;
pub use effector::{Effector, EffectorValue, RecordingEffector, SysfsGpioEffector};
pub use encoding::{ApplicationTag, DecodeError, EncodeError};
pub use object::{ObjectIdentifier, ObjectRecord, ObjectType, ObjectValue, PropertyIdentifier};
pub use server::{DeviceConfig, Server};
pub use service::{ConfirmedServiceChoice, ReadPropertyRequest, WritePropertyRequest};

/// BACnet protocol version reported by the Device object.
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest APDU this server assembles.
pub const MAX_APDU: usize = 1476;
