//! BLE Service and Characteristic UUIDs.
//!
//! Contains the UUID and advertisement constants used for Switchbot
//! communication.

use uuid::Uuid;

// Switchbot Command Service (Switchbot Custom)
/// Switchbot command service UUID.
pub const SWITCHBOT_SERVICE_UUID: Uuid = Uuid::from_u128(0xcba2_0d00_224d_11e6_9fb8_0002a5d5c51b);
/// Switchbot command characteristic UUID (Write).
pub const SWITCHBOT_COMMAND_UUID: Uuid = Uuid::from_u128(0xcba2_0002_224d_11e6_9fb8_0002a5d5c51b);

// Advertisement data structure types
/// AD type of "Service Data - 16-bit UUID", carrying curtain status.
pub const SERVICE_DATA_AD_TYPE: u8 = 0x16;
/// AD type of "Manufacturer Specific Data".
pub const MANUFACTURER_DATA_AD_TYPE: u8 = 0xFF;

/// Bluetooth base UUID used to expand 16-bit UUIDs.
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_00805f9b34fb;

/// Get the 16-bit short form of a UUID derived from the Bluetooth base UUID.
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let mask = !(0xFFFF_u128 << 96);
    if value & mask == BLUETOOTH_BASE_UUID {
        Some((value >> 96) as u16)
    } else {
        None
    }
}
