//! BLE connection management.
//!
//! Runs the connect, write, disconnect cycle for a single command with a
//! bounded number of retries.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::ble::transport::{AddressType, BleTransport};
use crate::ble::uuids::{SWITCHBOT_COMMAND_UUID, SWITCHBOT_SERVICE_UUID};
use crate::device::DeviceIdentity;
use crate::error::{Error, Result};
use crate::protocol::payload_bytes;

/// Default number of retries after the first failed attempt.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Default pause between two attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Connection state of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection open.
    #[default]
    Idle,
    /// Currently attempting to connect.
    Connecting,
    /// Connected to the device.
    Connected,
    /// Writing a command to the device.
    Writing,
    /// Currently disconnecting.
    Disconnecting,
    /// Every attempt failed; the session gave up.
    Failed,
}

impl ConnectionState {
    /// Check if a connection is open.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Writing)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Writing => write!(f, "Writing"),
            Self::Disconnecting => write!(f, "Disconnecting"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Phase in which an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connect,
    Write,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Write => write!(f, "write"),
        }
    }
}

/// Delivers one command to a device.
///
/// The session owns the connection for the duration of an attempt and
/// always releases it before the attempt returns.
pub struct DeviceSession<'a, T: BleTransport> {
    /// Transport used to reach the device.
    transport: &'a T,
    /// Identity of the target device.
    identity: &'a DeviceIdentity,
    /// Pause between attempts.
    retry_delay: Duration,
    /// Open connection, if any.
    connection: Option<T::Connection>,
    /// Current state.
    state: ConnectionState,
}

impl<'a, T: BleTransport> DeviceSession<'a, T> {
    /// Create a new session for a device.
    pub fn new(transport: &'a T, identity: &'a DeviceIdentity) -> Self {
        Self {
            transport,
            identity,
            retry_delay: DEFAULT_RETRY_DELAY,
            connection: None,
            state: ConnectionState::Idle,
        }
    }

    /// Set the pause between attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Send a hex payload, retrying up to `retry_budget` more times.
    ///
    /// Returns `true` as soon as one attempt is acknowledged and `false`
    /// once the budget is exhausted. Transport errors never escape; they
    /// count as failed attempts.
    pub async fn send_command(&mut self, payload: &str, retry_budget: u32) -> bool {
        let data = match payload_bytes(payload) {
            Ok(data) => data,
            Err(e) => {
                error!(address = %self.identity.address(), error = %e, "Refusing to send command");
                return false;
            }
        };

        debug!(address = %self.identity.address(), %payload, "Sending command to Switchbot");

        let mut remaining = retry_budget;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            if self.attempt(&data).await {
                return true;
            }

            if remaining == 0 {
                error!(
                    address = %self.identity.address(),
                    attempts = attempt,
                    "Switchbot communication failed. Stopping trying."
                );
                self.set_state(ConnectionState::Failed);
                return false;
            }

            warn!(
                address = %self.identity.address(),
                remaining,
                "Cannot connect to Switchbot. Retrying"
            );
            tokio::time::sleep(self.retry_delay).await;
            remaining -= 1;
        }
    }

    /// Run one connect, write, disconnect cycle.
    async fn attempt(&mut self, data: &[u8]) -> bool {
        let connected = self.connect().await;
        let result = match connected {
            Ok(()) => self.write(data).await.map_err(|e| (Phase::Write, e)),
            Err(e) => Err((Phase::Connect, e)),
        };

        self.disconnect().await;

        match result {
            Ok(acknowledged) => acknowledged,
            Err((phase, e)) => {
                warn!(
                    address = %self.identity.address(),
                    %phase,
                    error = %e,
                    "Error talking to Switchbot"
                );
                false
            }
        }
    }

    /// Open a connection unless one is already open.
    async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            debug!("Already connected");
            return Ok(());
        }

        let transport = self.transport;
        let identity = self.identity;

        self.set_state(ConnectionState::Connecting);
        debug!(address = %identity.address(), "Connecting to Switchbot...");

        let result = transport
            .connect(identity.address(), AddressType::Random, identity.interface())
            .await;

        match result {
            Ok(connection) => {
                self.connection = Some(connection);
                self.set_state(ConnectionState::Connected);
                debug!(address = %identity.address(), "Connected to Switchbot.");
                Ok(())
            }
            Err(e) => {
                debug!(address = %identity.address(), error = %e, "Failed connecting to Switchbot.");
                self.connection = None;
                self.set_state(ConnectionState::Idle);
                Err(e)
            }
        }
    }

    /// Write the command to the command characteristic.
    ///
    /// Returns whether the device acknowledged the write.
    async fn write(&mut self, data: &[u8]) -> Result<bool> {
        self.set_state(ConnectionState::Writing);

        let connection = self.connection.as_ref().ok_or_else(|| Error::ConnectionFailed {
            reason: "No open connection".to_string(),
        })?;

        debug!("Prepare to send");
        let characteristic = self
            .transport
            .characteristic(connection, SWITCHBOT_SERVICE_UUID, SWITCHBOT_COMMAND_UUID)
            .await?;

        debug!("Sending command, {:02X?}", data);
        let acknowledged = self
            .transport
            .write(connection, &characteristic, data, true)
            .await?;

        if acknowledged {
            info!(
                address = %self.identity.address(),
                "Successfully sent command to Switchbot"
            );
        } else {
            error!(
                address = %self.identity.address(),
                "Sent command but didn't get a response from Switchbot confirming command was sent. \
                 Please check the Switchbot."
            );
        }

        Ok(acknowledged)
    }

    /// Release the connection. Failures are logged and the connection is dropped anyway.
    async fn disconnect(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        self.set_state(ConnectionState::Disconnecting);
        debug!("Disconnecting");

        if let Err(e) = self.transport.disconnect(connection).await {
            warn!(
                address = %self.identity.address(),
                error = %e,
                "Error disconnecting from Switchbot."
            );
        }

        self.set_state(ConnectionState::Idle);
    }

    /// Update the connection state.
    fn set_state(&mut self, new_state: ConnectionState) {
        let old_state = std::mem::replace(&mut self.state, new_state);

        if old_state != new_state {
            debug!("Connection state changed: {} -> {}", old_state, new_state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::fake::{FakeTransport, Step};
    use pretty_assertions::assert_eq;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("AA:BB:CC:DD:EE:FF", Some(1), None)
    }

    #[test]
    fn test_connection_state() {
        assert!(!ConnectionState::Idle.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert!(ConnectionState::Writing.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Connected), "Connected");
        assert_eq!(format!("{}", ConnectionState::Idle), "Idle");
        assert_eq!(format!("{}", ConnectionState::Failed), "Failed");
    }

    #[tokio::test]
    async fn test_send_succeeds_first_try() {
        let transport = FakeTransport::new();
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity).with_retry_delay(Duration::ZERO);

        assert!(session.send_command("570101", 3).await);
        assert_eq!(session.state(), ConnectionState::Idle);
        assert!(!session.is_connected());

        let calls = transport.calls.lock();
        assert_eq!(calls.connects, 1);
        assert_eq!(calls.disconnects, 1);
        assert_eq!(calls.writes, vec![vec![0x57, 0x01, 0x01]]);
        assert_eq!(calls.address_types, vec![AddressType::Random]);
        assert_eq!(calls.interfaces, vec![Some(1)]);
    }

    #[tokio::test]
    async fn test_retries_until_acknowledged() {
        let transport = FakeTransport::new().with_writes(&[Step::Fail, Step::NoAck, Step::Fail]);
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity).with_retry_delay(Duration::ZERO);

        assert!(session.send_command("570100", 3).await);

        let calls = transport.calls.lock();
        assert_eq!(calls.writes.len(), 4);
        assert_eq!(calls.disconnects, 4);
    }

    #[tokio::test]
    async fn test_gives_up_when_budget_exhausted() {
        let transport = FakeTransport::new().with_writes(&[Step::NoAck; 5]);
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity).with_retry_delay(Duration::ZERO);

        assert!(!session.send_command("570100", 2).await);
        assert_eq!(session.state(), ConnectionState::Failed);

        let calls = transport.calls.lock();
        assert_eq!(calls.writes.len(), 3);
        assert_eq!(calls.disconnects, 3);
    }

    #[tokio::test]
    async fn test_zero_budget_single_attempt() {
        let transport = FakeTransport::new().with_writes(&[Step::Fail]);
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity).with_retry_delay(Duration::ZERO);

        assert!(!session.send_command("570100", 0).await);
        assert_eq!(transport.calls.lock().writes.len(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_retried() {
        let transport = FakeTransport::new().with_connects(&[Step::Fail, Step::Fail]);
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity).with_retry_delay(Duration::ZERO);

        assert!(session.send_command("570102", 3).await);

        let calls = transport.calls.lock();
        assert_eq!(calls.connects, 3);
        // Failed connects leave nothing to disconnect.
        assert_eq!(calls.disconnects, 1);
        assert_eq!(calls.writes.len(), 1);
    }

    #[tokio::test]
    async fn test_characteristic_lookup_failure_is_retried() {
        let transport = FakeTransport::new().with_characteristics(&[Step::Fail]);
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity).with_retry_delay(Duration::ZERO);

        assert!(session.send_command("570100", 1).await);

        let calls = transport.calls.lock();
        assert_eq!(calls.lookups, 2);
        assert_eq!(calls.writes.len(), 1);
        assert_eq!(calls.disconnects, 2);
        assert_eq!(calls.open, 0);
    }

    #[tokio::test]
    async fn test_characteristic_lookup_failure_exhausts_budget() {
        let transport = FakeTransport::new().with_characteristics(&[Step::Fail; 3]);
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity).with_retry_delay(Duration::ZERO);

        assert!(!session.send_command("570100", 2).await);
        assert_eq!(session.state(), ConnectionState::Failed);
        assert!(!session.is_connected());

        let calls = transport.calls.lock();
        assert_eq!(calls.connects, 3);
        assert_eq!(calls.lookups, 3);
        assert!(calls.writes.is_empty());
        // Released once per attempt even though nothing was written.
        assert_eq!(calls.disconnects, 3);
        assert_eq!(calls.open, 0);
    }

    #[tokio::test]
    async fn test_disconnect_failure_is_swallowed() {
        let transport = FakeTransport::new().with_disconnects(&[Step::Fail]);
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity).with_retry_delay(Duration::ZERO);

        assert!(session.send_command("570100", 0).await);
        assert!(!session.is_connected());
        assert_eq!(session.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_invalid_payload_not_sent() {
        let transport = FakeTransport::new();
        let identity = identity();
        let mut session = DeviceSession::new(&transport, &identity);

        assert!(!session.send_command("57010", 3).await);
        assert_eq!(transport.calls.lock().connects, 0);
    }
}
