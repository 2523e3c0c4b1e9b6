//! Curtain advertisement decoding.
//!
//! Curtain bots broadcast their battery level, position and light level in
//! the service data field (AD type 0x16) of their advertisements. The field
//! value is the hex text of the payload; the state lives in its last three
//! bytes.

use crate::error::{Error, Result};

/// Status decoded from a curtain advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurtainAdvertisement {
    /// Battery charge in percent (0-100).
    pub battery_percent: u8,
    /// Device-facing position (0 = open, 100 = closed).
    pub position: u8,
    /// Ambient light level reported by the solar panel sensor.
    pub light_level: u8,
}

impl CurtainAdvertisement {
    /// Number of trailing hex characters carrying the status.
    const STATUS_LEN: usize = 6;

    /// Parse the status from the hex text of a service data field.
    ///
    /// # Arguments
    ///
    /// * `value` - ASCII hex text of the type 0x16 advertisement field
    ///
    /// # Returns
    ///
    /// The decoded status, or `MalformedAdvertisement` if the text is too
    /// short or its trailing characters are not hex.
    ///
    /// # Example
    ///
    /// ```
    /// use switchbot_rust_ble::protocol::CurtainAdvertisement;
    ///
    /// let status = CurtainAdvertisement::parse(b"3dfd630040321E32").unwrap();
    /// assert_eq!(status.battery_percent, 50);
    /// assert_eq!(status.position, 30);
    /// assert_eq!(status.light_level, 50);
    /// ```
    pub fn parse(value: &[u8]) -> Result<Self> {
        if value.len() < Self::STATUS_LEN {
            return Err(Error::MalformedAdvertisement {
                context: format!(
                    "Service data too short: {} characters (need at least {})",
                    value.len(),
                    Self::STATUS_LEN
                ),
            });
        }

        let tail = &value[value.len() - Self::STATUS_LEN..];

        Ok(Self {
            battery_percent: hex_pair(&tail[0..2])?,
            position: hex_pair(&tail[2..4])?,
            light_level: hex_pair(&tail[4..6])?,
        })
    }
}

/// Parse two ASCII hex characters as a byte.
fn hex_pair(pair: &[u8]) -> Result<u8> {
    let mut byte = [0u8; 1];
    hex::decode_to_slice(pair, &mut byte).map_err(|e| Error::MalformedAdvertisement {
        context: format!("{:?} is not a hex byte: {}", String::from_utf8_lossy(pair), e),
    })?;
    Ok(byte[0])
}
