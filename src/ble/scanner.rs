//! BLE scanning functionality.
//!
//! Provides passive advertisement scanning and peripheral lookup on a
//! single btleplug adapter.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::transport::{Advertisement, AdvertisementField};
use crate::ble::uuids::{short_uuid, MANUFACTURER_DATA_AD_TYPE, SERVICE_DATA_AD_TYPE};
use crate::error::{Error, Result};
use crate::utils::addresses_match;

/// Interval between peripheral cache polls while looking for a device.
const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// BLE scanner bound to one adapter.
pub struct BleScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
}

impl BleScanner {
    /// Create a scanner on the `hci{interface}` adapter, or the first adapter.
    ///
    /// Platforms that do not name adapters `hciN` fall back to the
    /// adapter's position in the manager's list.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available or the adapter does
    /// not exist.
    pub async fn new(manager: &Manager, interface: Option<u32>) -> Result<Self> {
        let mut adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = match interface {
            Some(index) => {
                let mut names = Vec::with_capacity(adapters.len());
                for adapter in &adapters {
                    names.push(adapter.adapter_info().await.ok());
                }

                let position = adapter_position(&names, index)
                    .ok_or(Error::AdapterNotFound { index })?;
                adapters.swap_remove(position)
            }
            None => adapters
                .into_iter()
                .next()
                .ok_or(Error::BluetoothUnavailable)?,
        };

        debug!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter))
    }

    /// Create a new BLE scanner with a specific adapter.
    pub fn with_adapter(adapter: Adapter) -> Self {
        Self { adapter }
    }

    /// Scan for `duration`, handing every advertisement to the callback.
    ///
    /// Each service-data or manufacturer-data event becomes one
    /// advertisement carrying only that event's fields, so a received
    /// frame reaches the callback once.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning cannot be started.
    pub async fn scan_for(
        &self,
        duration: Duration,
        on_advertisement: &mut (dyn FnMut(Advertisement) + Send),
    ) -> Result<()> {
        let mut events = self.adapter.events().await.map_err(Error::Bluetooth)?;

        info!("Starting BLE scan for {:?}", duration);
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => {
                    let Some(event) = event else {
                        debug!("Adapter event stream ended");
                        break;
                    };
                    if let Some((id, fields)) = advertised_fields(event) {
                        if let Some((address, rssi)) = self.sender(&id).await {
                            on_advertisement(Advertisement { address, rssi, fields });
                        }
                    }
                }
            }
        }

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop BLE scan: {}", e);
        }

        debug!("Scan window ended");

        Ok(())
    }

    /// Find the peripheral with the given address.
    ///
    /// Looks in the adapter cache first and scans for up to `timeout`
    /// otherwise.
    pub async fn find_peripheral(&self, address: &str, timeout: Duration) -> Result<Peripheral> {
        if let Some(peripheral) = self.cached_peripheral(address).await? {
            return Ok(peripheral);
        }

        debug!(%address, "Device not cached, scanning for it");
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        let found = tokio::time::timeout(timeout, async {
            loop {
                if let Some(peripheral) = self.cached_peripheral(address).await? {
                    return Ok::<_, Error>(peripheral);
                }
                tokio::time::sleep(DISCOVERY_POLL_INTERVAL).await;
            }
        })
        .await;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop BLE scan: {}", e);
        }

        match found {
            Ok(result) => result,
            Err(_) => Err(Error::DeviceNotFound {
                address: address.to_string(),
            }),
        }
    }

    /// Look up a peripheral the adapter already knows.
    async fn cached_peripheral(&self, address: &str) -> Result<Option<Peripheral>> {
        let peripherals = self.adapter.peripherals().await.map_err(Error::Bluetooth)?;

        Ok(peripherals
            .into_iter()
            .find(|p| addresses_match(&p.address().to_string(), address)))
    }

    /// Get the address and signal strength of an advertising peripheral.
    async fn sender(&self, id: &PeripheralId) -> Option<(String, Option<i16>)> {
        let peripheral = match self.adapter.peripheral(id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return None;
            }
        };

        match peripheral.properties().await {
            Ok(Some(properties)) => Some((properties.address.to_string(), properties.rssi)),
            _ => None,
        }
    }
}

/// Find the adapter named `hci{index}` among the adapters' info strings.
///
/// When no adapter carries an `hciN` name, `index` is taken as a position.
fn adapter_position(infos: &[Option<String>], index: u32) -> Option<usize> {
    let wanted = format!("hci{}", index);
    let name = |info: &Option<String>| {
        info.as_deref()
            .and_then(|info| info.split_whitespace().next())
            .map(str::to_owned)
    };

    if let Some(position) = infos
        .iter()
        .position(|info| name(info).as_deref() == Some(wanted.as_str()))
    {
        return Some(position);
    }

    let any_hci_names = infos
        .iter()
        .filter_map(name)
        .any(|n| n.starts_with("hci"));
    let position = index as usize;

    (!any_hci_names && position < infos.len()).then_some(position)
}

/// Split an advertisement-bearing event into its peripheral and AD fields.
fn advertised_fields(event: CentralEvent) -> Option<(PeripheralId, Vec<AdvertisementField>)> {
    match event {
        CentralEvent::ServiceDataAdvertisement { id, service_data } => {
            Some((id, service_data_fields(&service_data)))
        }
        CentralEvent::ManufacturerDataAdvertisement {
            id,
            manufacturer_data,
        } => Some((id, manufacturer_data_fields(&manufacturer_data))),
        _ => None,
    }
}

/// Convert service data into type 0x16 fields.
///
/// Each payload is prefixed with the little-endian 16-bit UUID when the
/// UUID derives from the Bluetooth base UUID.
fn service_data_fields(service_data: &HashMap<Uuid, Vec<u8>>) -> Vec<AdvertisementField> {
    service_data
        .iter()
        .map(|(uuid, data)| {
            let mut payload = short_uuid(uuid)
                .map(|short| short.to_le_bytes().to_vec())
                .unwrap_or_default();
            payload.extend_from_slice(data);
            AdvertisementField::from_bytes(SERVICE_DATA_AD_TYPE, &payload)
        })
        .collect()
}

/// Convert manufacturer data into type 0xFF fields prefixed with the
/// little-endian company ID.
fn manufacturer_data_fields(manufacturer_data: &HashMap<u16, Vec<u8>>) -> Vec<AdvertisementField> {
    manufacturer_data
        .iter()
        .map(|(company_id, data)| {
            let mut payload = company_id.to_le_bytes().to_vec();
            payload.extend_from_slice(data);
            AdvertisementField::from_bytes(MANUFACTURER_DATA_AD_TYPE, &payload)
        })
        .collect()
}
