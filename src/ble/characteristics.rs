//! GATT characteristic handling.
//!
//! Resolves and writes characteristics on a connected Switchbot.

use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Handler for GATT characteristics on a device.
pub struct CharacteristicHandler<'a> {
    /// The peripheral to communicate with.
    peripheral: &'a Peripheral,
}

impl<'a> CharacteristicHandler<'a> {
    /// Create a new characteristic handler for a peripheral.
    ///
    /// Note: Services must be discovered before using this handler.
    pub fn new(peripheral: &'a Peripheral) -> Self {
        Self { peripheral }
    }

    /// Find a characteristic within a service.
    pub fn find(&self, service_uuid: &Uuid, characteristic_uuid: &Uuid) -> Result<Characteristic> {
        let services = self.peripheral.services();

        let service = services
            .iter()
            .find(|s| s.uuid == *service_uuid)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: service_uuid.to_string(),
            })?;

        service
            .characteristics
            .iter()
            .find(|c| c.uuid == *characteristic_uuid)
            .cloned()
            .ok_or_else(|| {
                for c in &service.characteristics {
                    debug!("  Available characteristic: {}", c.uuid);
                }
                Error::CharacteristicNotFound {
                    uuid: characteristic_uuid.to_string(),
                }
            })
    }

    /// Write to a characteristic.
    pub async fn write(
        &self,
        characteristic: &Characteristic,
        data: &[u8],
        with_response: bool,
    ) -> Result<()> {
        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        self.peripheral
            .write(characteristic, data, write_type)
            .await
            .map_err(|e| Error::WriteFailed {
                reason: e.to_string(),
            })?;

        trace!(
            "Wrote {} bytes to characteristic {}",
            data.len(),
            characteristic.uuid
        );

        Ok(())
    }
}
