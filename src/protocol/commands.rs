//! Command encoding.
//!
//! Maps logical commands to the hexadecimal opcodes understood by the
//! Switchbot firmware, including the password-challenge form.

use crate::error::{Error, Result};
use crate::protocol::crc::calculate_crc32;

/// Press opcode.
pub const PRESS_KEY: &str = "570100";
/// Turn on opcode.
pub const ON_KEY: &str = "570101";
/// Turn off opcode.
pub const OFF_KEY: &str = "570102";

/// Curtain open opcode.
pub const OPEN_KEY: &str = "570f450105ff00";
/// Curtain close opcode.
pub const CLOSE_KEY: &str = "570f450105ff64";
/// Curtain set-position prefix, followed by the position byte in hex.
pub const POSITION_KEY: &str = "570F450105ff";
/// Curtain stop opcode.
pub const STOP_KEY: &str = "570F450100ff";

/// Prefix marking a password-protected command.
pub const KEY_PASSWORD_PREFIX: &str = "5711";

/// Suffix of a password-protected press (and any non on/off command).
pub const PRESS_KEY_SUFFIX: &str = "00";
/// Suffix of a password-protected turn on.
pub const ON_KEY_SUFFIX: &str = "01";
/// Suffix of a password-protected turn off.
pub const OFF_KEY_SUFFIX: &str = "02";

/// Highest curtain position.
pub const MAX_POSITION: u8 = 100;

/// A logical command understood by a Switchbot device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKey {
    /// Press the bot arm.
    Press,
    /// Switch mode: turn on.
    TurnOn,
    /// Switch mode: turn off.
    TurnOff,
    /// Fully open the curtain.
    CurtainOpen,
    /// Fully close the curtain.
    CurtainClose,
    /// Stop the curtain motor.
    CurtainStop,
    /// Move the curtain to a device-facing position (0-100).
    CurtainSetPosition(u8),
}

impl CommandKey {
    /// Get the base opcode for this command, without any password encoding.
    pub fn opcode(&self) -> String {
        match self {
            Self::Press => PRESS_KEY.to_string(),
            Self::TurnOn => ON_KEY.to_string(),
            Self::TurnOff => OFF_KEY.to_string(),
            Self::CurtainOpen => OPEN_KEY.to_string(),
            Self::CurtainClose => CLOSE_KEY.to_string(),
            Self::CurtainStop => STOP_KEY.to_string(),
            Self::CurtainSetPosition(position) => format!("{}{:02X}", POSITION_KEY, position),
        }
    }

    /// Get the password-challenge suffix for this command.
    ///
    /// The firmware only knows on, off and press in this form, so every
    /// curtain command falls back to the press suffix.
    pub fn password_suffix(&self) -> &'static str {
        match self {
            Self::TurnOn => ON_KEY_SUFFIX,
            Self::TurnOff => OFF_KEY_SUFFIX,
            _ => PRESS_KEY_SUFFIX,
        }
    }

    /// Get a short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::TurnOn => "turn_on",
            Self::TurnOff => "turn_off",
            Self::CurtainOpen => "open",
            Self::CurtainClose => "close",
            Self::CurtainStop => "stop",
            Self::CurtainSetPosition(_) => "set_position",
        }
    }
}

impl std::fmt::Display for CommandKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CurtainSetPosition(position) => write!(f, "set_position({})", position),
            _ => write!(f, "{}", self.name()),
        }
    }
}

/// Password derived from the device secret.
///
/// Lowercase hex CRC-32 of the ASCII secret, without zero padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedPassword(String);

impl EncodedPassword {
    /// Derive the encoded password from a plain-text secret.
    ///
    /// Returns `None` for an empty secret.
    pub fn from_secret(secret: &str) -> Option<Self> {
        if secret.is_empty() {
            return None;
        }
        Some(Self(format!("{:x}", calculate_crc32(secret.as_bytes()))))
    }

    /// Get the encoded password as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EncodedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode a command into the hex string sent to the device.
///
/// Without a password the base opcode is returned unchanged.
///
/// # Example
///
/// ```
/// use switchbot_rust_ble::protocol::{encode, CommandKey, EncodedPassword};
///
/// assert_eq!(encode(CommandKey::TurnOn, None), "570101");
///
/// let password = EncodedPassword::from_secret("123456789");
/// assert_eq!(encode(CommandKey::TurnOn, password.as_ref()), "5711cbf4392601");
/// ```
pub fn encode(command: CommandKey, password: Option<&EncodedPassword>) -> String {
    match password {
        None => command.opcode(),
        Some(password) => format!(
            "{}{}{}",
            KEY_PASSWORD_PREFIX,
            password.as_str(),
            command.password_suffix()
        ),
    }
}

/// Map a logical curtain position to the device-facing one.
///
/// # Returns
///
/// The device-facing position and its two-digit hex rendering.
pub fn encode_position(position: u8, reverse_mode: bool) -> (u8, String) {
    let position = position.min(MAX_POSITION);
    let device_position = if reverse_mode {
        MAX_POSITION - position
    } else {
        position
    };
    (device_position, format!("{:02X}", device_position))
}

/// Convert a hex command string to the bytes written to the device.
pub fn payload_bytes(payload: &str) -> Result<Vec<u8>> {
    hex::decode(payload).map_err(|e| Error::InvalidPayload {
        context: format!("{:?} is not a hex payload: {}", payload, e),
    })
}
