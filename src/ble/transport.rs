//! BLE transport abstraction.
//!
//! The device session only needs a handful of GATT and scanning primitives.
//! They are collected in [`BleTransport`] so the retry logic can run over
//! btleplug in production and over a scripted fake in tests.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;

/// BLE address type used when opening a connection.
///
/// Switchbot devices only advertise with a random static address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressType {
    /// Random static address.
    #[default]
    Random,
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
        }
    }
}

/// One AD structure of a received advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementField {
    /// AD type code (e.g. 0x16 for 16-bit service data).
    pub ad_type: u8,
    /// Lowercase hex text of the AD structure payload.
    pub value: String,
}

impl AdvertisementField {
    /// Create a field from raw payload bytes.
    pub fn from_bytes(ad_type: u8, payload: &[u8]) -> Self {
        Self {
            ad_type,
            value: hex::encode(payload),
        }
    }
}

/// A received advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    /// Address of the advertising device.
    pub address: String,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
    /// AD structures carried by the advertisement.
    pub fields: Vec<AdvertisementField>,
}

impl Advertisement {
    /// Iterate over the fields of a given AD type.
    pub fn fields_of_type(&self, ad_type: u8) -> impl Iterator<Item = &AdvertisementField> {
        self.fields.iter().filter(move |f| f.ad_type == ad_type)
    }
}

/// GATT and scanning primitives a device session needs from the platform.
#[async_trait]
pub trait BleTransport: Send + Sync {
    /// An open connection. Owned by exactly one session at a time.
    type Connection: Send + Sync;
    /// A resolved characteristic on a connection.
    type Characteristic: Send + Sync;

    /// Open a connection to the device at `address`.
    ///
    /// `interface` selects the adapter (hci index); `None` uses the default.
    async fn connect(
        &self,
        address: &str,
        address_type: AddressType,
        interface: Option<u32>,
    ) -> Result<Self::Connection>;

    /// Close a connection. The connection is consumed even on error.
    async fn disconnect(&self, connection: Self::Connection) -> Result<()>;

    /// Resolve a characteristic within a service.
    async fn characteristic(
        &self,
        connection: &Self::Connection,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Self::Characteristic>;

    /// Write to a characteristic.
    ///
    /// Returns whether the device acknowledged the write.
    async fn write(
        &self,
        connection: &Self::Connection,
        characteristic: &Self::Characteristic,
        data: &[u8],
        with_response: bool,
    ) -> Result<bool>;

    /// Passively scan for `duration`, handing each advertisement to the callback.
    async fn scan(
        &self,
        interface: Option<u32>,
        duration: Duration,
        on_advertisement: &mut (dyn FnMut(Advertisement) + Send),
    ) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted transport for tests.

    use super::*;
    use crate::error::Error;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Outcome of one scripted transport call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Step {
        /// Call succeeds (write is acknowledged).
        Ok,
        /// Write completes but is not acknowledged.
        NoAck,
        /// Call returns an error.
        Fail,
    }

    #[derive(Debug, Default)]
    pub(crate) struct Calls {
        pub connects: usize,
        pub disconnects: usize,
        pub lookups: usize,
        /// Connections currently open.
        pub open: usize,
        /// Highest value `open` reached.
        pub peak_open: usize,
        pub writes: Vec<Vec<u8>>,
        pub address_types: Vec<AddressType>,
        pub interfaces: Vec<Option<u32>>,
        pub scans: usize,
    }

    /// Transport whose connect/lookup/write/disconnect outcomes are scripted.
    ///
    /// Unscripted calls succeed. Connect and write yield to the runtime
    /// once, so concurrent callers interleave the way they would on a
    /// real adapter.
    #[derive(Default)]
    pub(crate) struct FakeTransport {
        connect_steps: Mutex<VecDeque<Step>>,
        characteristic_steps: Mutex<VecDeque<Step>>,
        write_steps: Mutex<VecDeque<Step>>,
        disconnect_steps: Mutex<VecDeque<Step>>,
        advertisements: Vec<Advertisement>,
        pub calls: Mutex<Calls>,
    }

    impl FakeTransport {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_connects(self, steps: &[Step]) -> Self {
            self.connect_steps.lock().extend(steps.iter().copied());
            self
        }

        pub(crate) fn with_characteristics(self, steps: &[Step]) -> Self {
            self.characteristic_steps.lock().extend(steps.iter().copied());
            self
        }

        pub(crate) fn with_writes(self, steps: &[Step]) -> Self {
            self.write_steps.lock().extend(steps.iter().copied());
            self
        }

        pub(crate) fn with_disconnects(self, steps: &[Step]) -> Self {
            self.disconnect_steps.lock().extend(steps.iter().copied());
            self
        }

        pub(crate) fn with_advertisements(mut self, advertisements: Vec<Advertisement>) -> Self {
            self.advertisements = advertisements;
            self
        }

        fn next(steps: &Mutex<VecDeque<Step>>) -> Step {
            steps.lock().pop_front().unwrap_or(Step::Ok)
        }
    }

    #[async_trait]
    impl BleTransport for FakeTransport {
        type Connection = usize;
        type Characteristic = Uuid;

        async fn connect(
            &self,
            _address: &str,
            address_type: AddressType,
            interface: Option<u32>,
        ) -> Result<usize> {
            let id = {
                let mut calls = self.calls.lock();
                calls.connects += 1;
                calls.address_types.push(address_type);
                calls.interfaces.push(interface);
                calls.connects
            };

            tokio::task::yield_now().await;

            match Self::next(&self.connect_steps) {
                Step::Fail => Err(Error::ConnectionFailed {
                    reason: "scripted".to_string(),
                }),
                _ => {
                    let mut calls = self.calls.lock();
                    calls.open += 1;
                    calls.peak_open = calls.peak_open.max(calls.open);
                    Ok(id)
                }
            }
        }

        async fn disconnect(&self, _connection: usize) -> Result<()> {
            {
                let mut calls = self.calls.lock();
                calls.disconnects += 1;
                calls.open -= 1;
            }
            match Self::next(&self.disconnect_steps) {
                Step::Fail => Err(Error::DisconnectFailed {
                    reason: "scripted".to_string(),
                }),
                _ => Ok(()),
            }
        }

        async fn characteristic(
            &self,
            _connection: &usize,
            _service: Uuid,
            characteristic: Uuid,
        ) -> Result<Uuid> {
            self.calls.lock().lookups += 1;
            match Self::next(&self.characteristic_steps) {
                Step::Fail => Err(Error::CharacteristicNotFound {
                    uuid: characteristic.to_string(),
                }),
                _ => Ok(characteristic),
            }
        }

        async fn write(
            &self,
            _connection: &usize,
            _characteristic: &Uuid,
            data: &[u8],
            _with_response: bool,
        ) -> Result<bool> {
            self.calls.lock().writes.push(data.to_vec());
            tokio::task::yield_now().await;
            match Self::next(&self.write_steps) {
                Step::Ok => Ok(true),
                Step::NoAck => Ok(false),
                Step::Fail => Err(Error::WriteFailed {
                    reason: "scripted".to_string(),
                }),
            }
        }

        async fn scan(
            &self,
            _interface: Option<u32>,
            _duration: Duration,
            on_advertisement: &mut (dyn FnMut(Advertisement) + Send),
        ) -> Result<()> {
            self.calls.lock().scans += 1;
            for advertisement in &self.advertisements {
                on_advertisement(advertisement.clone());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_bytes() {
        let field = AdvertisementField::from_bytes(0x16, &[0x3d, 0xfd, 0x32, 0x1E, 0x32]);
        assert_eq!(field.value, "3dfd321e32");
    }

    #[test]
    fn test_fields_of_type() {
        let advertisement = Advertisement {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            rssi: Some(-60),
            fields: vec![
                AdvertisementField::from_bytes(0xFF, &[0x59, 0x00]),
                AdvertisementField::from_bytes(0x16, &[0x00, 0x0d]),
            ],
        };
        let service_data: Vec<_> = advertisement.fields_of_type(0x16).collect();
        assert_eq!(service_data.len(), 1);
        assert_eq!(service_data[0].value, "000d");
    }

    #[test]
    fn test_address_type_default() {
        assert_eq!(AddressType::default(), AddressType::Random);
        assert_eq!(AddressType::Random.to_string(), "random");
    }
}
