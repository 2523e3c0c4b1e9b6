//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy plumbing for reaching
//! Switchbot devices: the transport seam, the retrying device session,
//! and the btleplug implementation behind it.

pub mod characteristics;
pub mod connection;
pub mod platform;
pub mod scanner;
pub mod transport;
pub mod uuids;

pub use characteristics::CharacteristicHandler;
pub use connection::{ConnectionState, DeviceSession};
pub use platform::BtleplugTransport;
pub use scanner::BleScanner;
pub use transport::{AddressType, Advertisement, AdvertisementField, BleTransport};
pub use uuids::*;
