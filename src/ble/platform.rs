//! btleplug-backed transport.
//!
//! The production [`BleTransport`] used on macOS, Linux and Windows.

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _};
use btleplug::platform::{Manager, Peripheral};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::characteristics::CharacteristicHandler;
use crate::ble::scanner::BleScanner;
use crate::ble::transport::{AddressType, Advertisement, BleTransport};
use crate::error::{Error, Result};

/// Transport over the platform Bluetooth stack.
#[derive(Clone)]
pub struct BtleplugTransport {
    /// btleplug manager.
    manager: Manager,
    /// How long `connect` scans for a device it has not seen yet.
    discovery_timeout: Duration,
}

impl BtleplugTransport {
    /// Default time `connect` spends looking for an unseen device.
    pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a new transport.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        Ok(Self::with_manager(manager))
    }

    /// Create a new transport from an existing manager.
    pub fn with_manager(manager: Manager) -> Self {
        Self {
            manager,
            discovery_timeout: Self::DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    /// Set how long `connect` scans for a device it has not seen yet.
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }
}

#[async_trait]
impl BleTransport for BtleplugTransport {
    type Connection = Peripheral;
    type Characteristic = Characteristic;

    async fn connect(
        &self,
        address: &str,
        address_type: AddressType,
        interface: Option<u32>,
    ) -> Result<Peripheral> {
        // The platform stack resolves the address type from the advertisement.
        debug!(%address, %address_type, ?interface, "Opening connection");

        let scanner = BleScanner::new(&self.manager, interface).await?;
        let peripheral = scanner
            .find_peripheral(address, self.discovery_timeout)
            .await?;

        if !peripheral.is_connected().await.unwrap_or(false) {
            peripheral
                .connect()
                .await
                .map_err(|e| Error::ConnectionFailed {
                    reason: e.to_string(),
                })?;
        }

        if let Err(e) = peripheral.discover_services().await {
            warn!("Failed to discover services: {}", e);
            if let Err(e) = peripheral.disconnect().await {
                debug!("Disconnect after failed discovery: {}", e);
            }
            return Err(Error::ConnectionFailed {
                reason: format!("service discovery failed: {}", e),
            });
        }

        info!(%address, "Connected");

        Ok(peripheral)
    }

    async fn disconnect(&self, connection: Peripheral) -> Result<()> {
        connection
            .disconnect()
            .await
            .map_err(|e| Error::DisconnectFailed {
                reason: e.to_string(),
            })
    }

    async fn characteristic(
        &self,
        connection: &Peripheral,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic> {
        CharacteristicHandler::new(connection).find(&service, &characteristic)
    }

    async fn write(
        &self,
        connection: &Peripheral,
        characteristic: &Characteristic,
        data: &[u8],
        with_response: bool,
    ) -> Result<bool> {
        CharacteristicHandler::new(connection)
            .write(characteristic, data, with_response)
            .await?;

        // btleplug reports a missing write response as an error.
        Ok(true)
    }

    async fn scan(
        &self,
        interface: Option<u32>,
        duration: Duration,
        on_advertisement: &mut (dyn FnMut(Advertisement) + Send),
    ) -> Result<()> {
        let scanner = BleScanner::new(&self.manager, interface).await?;
        scanner.scan_for(duration, on_advertisement).await
    }
}
