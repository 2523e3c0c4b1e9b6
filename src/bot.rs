//! Switchbot bot.
//!
//! The press/toggle bot: a small arm that presses a button, or flips a
//! switch on and off in switch mode.

use crate::ble::transport::BleTransport;
use crate::device::{DeviceConfig, SwitchbotDevice};
use crate::protocol::CommandKey;

/// Representation of a Switchbot bot.
pub struct Switchbot<T: BleTransport> {
    device: SwitchbotDevice<T>,
}

impl<T: BleTransport> Switchbot<T> {
    /// Create a bot with the default configuration.
    pub fn new(transport: T, address: impl Into<String>) -> Self {
        Self::with_config(transport, address, &DeviceConfig::default())
    }

    /// Create a bot with the given configuration.
    pub fn with_config(transport: T, address: impl Into<String>, config: &DeviceConfig) -> Self {
        Self {
            device: SwitchbotDevice::new(transport, address, config),
        }
    }

    /// Turn device on.
    pub async fn turn_on(&self) -> bool {
        self.device.send_command(CommandKey::TurnOn).await
    }

    /// Turn device off.
    pub async fn turn_off(&self) -> bool {
        self.device.send_command(CommandKey::TurnOff).await
    }

    /// Press command to device.
    pub async fn press(&self) -> bool {
        self.device.send_command(CommandKey::Press).await
    }

    /// Get the BLE address.
    pub fn address(&self) -> &str {
        self.device.address()
    }

    /// Get the retry count.
    pub fn retry_count(&self) -> u32 {
        self.device.retry_count()
    }

    /// Get the underlying device.
    pub fn device(&self) -> &SwitchbotDevice<T> {
        &self.device
    }
}
