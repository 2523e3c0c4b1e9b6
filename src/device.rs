//! Shared device core.
//!
//! Holds the identity and configuration common to every Switchbot device
//! and turns commands into device sessions.

use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::ble::connection::{DeviceSession, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY};
use crate::ble::transport::BleTransport;
use crate::protocol::{encode, CommandKey, EncodedPassword};

/// Identity of a device: address, adapter and encoded password.
///
/// The address is kept as given; lookups compare it ignoring case. The
/// password is encoded once, here, and never recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    address: String,
    interface: Option<u32>,
    password: Option<EncodedPassword>,
}

impl DeviceIdentity {
    /// Create a new identity.
    ///
    /// # Arguments
    ///
    /// * `address` - BLE address of the device
    /// * `interface` - Adapter index (hci number), `None` for the default adapter
    /// * `password` - Plain-text device password; empty counts as none
    pub fn new(address: impl Into<String>, interface: Option<u32>, password: Option<&str>) -> Self {
        Self {
            address: address.into(),
            interface,
            password: password.and_then(EncodedPassword::from_secret),
        }
    }

    /// Get the BLE address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Get the adapter index.
    pub fn interface(&self) -> Option<u32> {
        self.interface
    }

    /// Get the encoded password.
    pub fn password(&self) -> Option<&EncodedPassword> {
        self.password.as_ref()
    }
}

/// Configuration for a device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DeviceConfig {
    /// Retries after the first failed attempt.
    pub retry_count: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Plain-text device password.
    pub password: Option<String>,
    /// Adapter index (hci number).
    pub interface: Option<u32>,
    /// Curtain only: 0 means closed and 100 means open.
    pub reverse_mode: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
            password: None,
            interface: None,
            reverse_mode: false,
        }
    }
}

impl DeviceConfig {
    /// Set the retry count.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the pause between attempts.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Set the device password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the adapter index.
    pub fn with_interface(mut self, interface: u32) -> Self {
        self.interface = Some(interface);
        self
    }

    /// Set reverse mode.
    pub fn with_reverse_mode(mut self, reverse_mode: bool) -> Self {
        self.reverse_mode = reverse_mode;
        self
    }
}

/// Base representation of a Switchbot device.
pub struct SwitchbotDevice<T: BleTransport> {
    /// Transport used to reach the device.
    transport: T,
    /// Identity of the device.
    identity: DeviceIdentity,
    /// Retries after the first failed attempt.
    retry_count: u32,
    /// Pause between attempts.
    retry_delay: Duration,
    /// Held for a whole send so one instance never opens two connections.
    session_lock: Mutex<()>,
}

impl<T: BleTransport> SwitchbotDevice<T> {
    /// Create a new device.
    pub fn new(transport: T, address: impl Into<String>, config: &DeviceConfig) -> Self {
        Self {
            transport,
            identity: DeviceIdentity::new(address, config.interface, config.password.as_deref()),
            retry_count: config.retry_count,
            retry_delay: config.retry_delay,
            session_lock: Mutex::new(()),
        }
    }

    /// Get the BLE address.
    pub fn address(&self) -> &str {
        self.identity.address()
    }

    /// Get the adapter index.
    pub fn interface(&self) -> Option<u32> {
        self.identity.interface()
    }

    /// Check if commands are sent in password-protected form.
    pub fn has_password(&self) -> bool {
        self.identity.password().is_some()
    }

    /// Get the retry count.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Get the device identity.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Get the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Encode and send a command with the configured retry budget.
    ///
    /// Concurrent calls on the same device are served one after another.
    pub async fn send_command(&self, command: CommandKey) -> bool {
        let payload = encode(command, self.identity.password());

        let _session = self.session_lock.lock().await;
        debug!(address = %self.identity.address(), %command, "Dispatching command");

        DeviceSession::new(&self.transport, &self.identity)
            .with_retry_delay(self.retry_delay)
            .send_command(&payload, self.retry_count)
            .await
    }
}
