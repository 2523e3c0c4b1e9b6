//! CRC calculation for password-protected commands.
//!
//! Uses CRC-32/ISO-HDLC (reflected polynomial 0xEDB88320), the same
//! checksum the Switchbot firmware applies to the device password.

/// Reflected CRC-32 polynomial
const CRC_POLYNOMIAL: u32 = 0xEDB8_8320;

/// Initial CRC value
const CRC_INITIAL: u32 = 0xFFFF_FFFF;

/// Calculate CRC-32 for the given data.
///
/// # Arguments
///
/// * `data` - The data bytes to calculate CRC for
///
/// # Returns
///
/// The 32-bit CRC value
///
/// # Example
///
/// ```
/// use switchbot_rust_ble::protocol::calculate_crc32;
///
/// assert_eq!(calculate_crc32(b"123456789"), 0xCBF4_3926);
/// ```
pub fn calculate_crc32(data: &[u8]) -> u32 {
    let mut crc = CRC_INITIAL;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }

    !crc
}
