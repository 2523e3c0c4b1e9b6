//! Switchbot curtain.
//!
//! Motorized curtain bot. Position, battery and light level are cached on
//! the facade: commands update the position optimistically, and
//! [`SwitchbotCurtain::update_state`] refreshes everything from the
//! device's advertisements.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::ble::transport::{Advertisement, BleTransport};
use crate::ble::uuids::SERVICE_DATA_AD_TYPE;
use crate::device::{DeviceConfig, SwitchbotDevice};
use crate::error::Result;
use crate::protocol::commands::MAX_POSITION;
use crate::protocol::{encode_position, CommandKey, CurtainAdvertisement};
use crate::utils::addresses_match;

/// Default scan window of [`SwitchbotCurtain::update`].
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(5);

/// Last known state of a curtain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurtainState {
    /// Position (0 = open, 100 = closed, swapped in reverse mode).
    pub position: u8,
    /// Battery charge in percent.
    pub battery_percent: u8,
    /// Light level.
    pub light_level: u8,
    /// When the fields were last overwritten from an advertisement.
    pub last_advertisement: Option<DateTime<Utc>>,
}

impl CurtainState {
    /// Overwrite the cached fields with a decoded advertisement.
    fn apply(&mut self, status: &CurtainAdvertisement) {
        self.battery_percent = status.battery_percent;
        self.position = status.position;
        self.light_level = status.light_level;
        self.last_advertisement = Some(Utc::now());
    }
}

/// Representation of a Switchbot curtain.
///
/// The position is kept with 0 = open and 100 = closed, independent of
/// how the curtain was calibrated. Reverse mode swaps this so that
/// 0 = closed and 100 = open, which suits curtains calibrated to open
/// left to right when the position drives a slider.
pub struct SwitchbotCurtain<T: BleTransport> {
    device: SwitchbotDevice<T>,
    reverse_mode: bool,
    state: Arc<RwLock<CurtainState>>,
}

impl<T: BleTransport> SwitchbotCurtain<T> {
    /// Create a curtain with the default configuration.
    pub fn new(transport: T, address: impl Into<String>) -> Self {
        Self::with_config(transport, address, &DeviceConfig::default())
    }

    /// Create a curtain with the given configuration.
    pub fn with_config(transport: T, address: impl Into<String>, config: &DeviceConfig) -> Self {
        Self {
            device: SwitchbotDevice::new(transport, address, config),
            reverse_mode: config.reverse_mode,
            state: Arc::new(RwLock::new(CurtainState::default())),
        }
    }

    /// Send open command.
    ///
    /// The cached position is set before sending and kept even if the
    /// send fails.
    pub async fn open(&self) -> bool {
        self.state.write().position = if self.reverse_mode { MAX_POSITION } else { 0 };
        self.device.send_command(CommandKey::CurtainOpen).await
    }

    /// Send close command.
    ///
    /// The cached position is set before sending and kept even if the
    /// send fails.
    pub async fn close(&self) -> bool {
        self.state.write().position = if self.reverse_mode { 0 } else { MAX_POSITION };
        self.device.send_command(CommandKey::CurtainClose).await
    }

    /// Send stop command to device.
    pub async fn stop(&self) -> bool {
        self.device.send_command(CommandKey::CurtainStop).await
    }

    /// Send position command (0-100) to device.
    ///
    /// Values above 100 are clamped. The cached position becomes the
    /// device-facing target before sending and is kept even if the send
    /// fails.
    pub async fn set_position(&self, position: u8) -> bool {
        if position > MAX_POSITION {
            warn!(
                address = %self.device.address(),
                position,
                "Curtain position out of range, clamping to {}",
                MAX_POSITION
            );
        }

        let (device_position, _) = encode_position(position, self.reverse_mode);
        self.state.write().position = device_position;
        self.device
            .send_command(CommandKey::CurtainSetPosition(device_position))
            .await
    }

    /// Update position, battery percent and light level from advertisements.
    ///
    /// Scans for [`DEFAULT_SCAN_TIMEOUT`].
    pub async fn update(&self) -> Result<usize> {
        self.update_state(DEFAULT_SCAN_TIMEOUT).await
    }

    /// Update position, battery percent and light level from advertisements.
    ///
    /// Scans passively for `scan_duration`; every matching advertisement
    /// overwrites the cached fields, malformed ones are skipped.
    ///
    /// # Returns
    ///
    /// The number of advertisements applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan cannot be run.
    pub async fn update_state(&self, scan_duration: Duration) -> Result<usize> {
        let address = self.device.address();
        let state = &self.state;
        let mut applied = 0usize;

        let mut on_advertisement = |advertisement: Advertisement| {
            if !addresses_match(&advertisement.address, address) {
                return;
            }

            for field in advertisement.fields_of_type(SERVICE_DATA_AD_TYPE) {
                match CurtainAdvertisement::parse(field.value.as_bytes()) {
                    Ok(status) => {
                        trace!(address = %address, ?status, "Curtain advertisement");
                        state.write().apply(&status);
                        applied += 1;
                    }
                    Err(e) => {
                        debug!(address = %address, error = %e, "Discarding curtain advertisement");
                    }
                }
            }
        };

        self.device
            .transport()
            .scan(self.device.interface(), scan_duration, &mut on_advertisement)
            .await?;

        debug!(address = %address, applied, "Curtain state update finished");

        Ok(applied)
    }

    // === Cached state ===

    /// Get the cached position (0-100). Call `update_state` first for the actual one.
    pub fn position(&self) -> u8 {
        self.state.read().position
    }

    /// Get the cached battery percent (0-100).
    pub fn battery_percent(&self) -> u8 {
        self.state.read().battery_percent
    }

    /// Get the cached light level.
    pub fn light_level(&self) -> u8 {
        self.state.read().light_level
    }

    /// Get a snapshot of the cached state.
    pub fn state(&self) -> CurtainState {
        self.state.read().clone()
    }

    /// Check if reverse mode is on (curtain opens from left to right).
    pub fn is_reversed(&self) -> bool {
        self.reverse_mode
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::transport::fake::{FakeTransport, Step};
    use crate::ble::transport::AdvertisementField;
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};

    const ADDRESS: &str = "E4:5A:0A:1B:2C:3D";

    fn config() -> DeviceConfig {
        DeviceConfig::default().with_retry_delay(Duration::ZERO)
    }

    fn advertisement(address: &str, service_data: &str) -> Advertisement {
        Advertisement {
            address: address.to_string(),
            rssi: Some(-70),
            fields: vec![
                AdvertisementField {
                    ad_type: 0x01,
                    value: "06".to_string(),
                },
                AdvertisementField {
                    ad_type: SERVICE_DATA_AD_TYPE,
                    value: service_data.to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_initial_state() {
        let curtain = SwitchbotCurtain::new(FakeTransport::new(), ADDRESS);
        assert_eq!(curtain.state(), CurtainState::default());
        assert!(!curtain.is_reversed());
        assert_eq!(curtain.retry_count(), 3);
    }

    #[tokio::test]
    async fn test_open_close_positions() {
        let curtain = SwitchbotCurtain::with_config(FakeTransport::new(), ADDRESS, &config());

        assert!(curtain.close().await);
        assert_eq!(curtain.position(), 100);
        assert!(curtain.open().await);
        assert_eq!(curtain.position(), 0);
        assert!(curtain.stop().await);
        assert_eq!(curtain.position(), 0);

        assert_eq!(
            curtain.device().transport().calls.lock().writes,
            vec![
                hex::decode("570f450105ff64").unwrap(),
                hex::decode("570f450105ff00").unwrap(),
                hex::decode("570F450100ff").unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn test_reverse_mode_positions() {
        let config = config().with_reverse_mode(true);
        let curtain = SwitchbotCurtain::with_config(FakeTransport::new(), ADDRESS, &config);
        assert!(curtain.is_reversed());

        curtain.close().await;
        assert_eq!(curtain.position(), 0);
        curtain.open().await;
        assert_eq!(curtain.position(), 100);

        curtain.set_position(70).await;
        assert_eq!(curtain.position(), 30);
        assert_eq!(
            curtain.device().transport().calls.lock().writes.last().cloned(),
            Some(hex::decode("570F450105ff1E").unwrap())
        );
    }

    #[tokio::test]
    async fn test_set_position_is_optimistic() {
        let transport = FakeTransport::new().with_writes(&[Step::NoAck; 4]);
        let curtain = SwitchbotCurtain::with_config(transport, ADDRESS, &config());

        assert!(!curtain.set_position(70).await);
        assert_eq!(curtain.position(), 70);
        assert_eq!(curtain.device().transport().calls.lock().writes.len(), 4);
    }

    #[tokio::test]
    async fn test_set_position_clamps() {
        let curtain = SwitchbotCurtain::with_config(FakeTransport::new(), ADDRESS, &config());

        assert!(curtain.set_position(150).await);
        assert_eq!(curtain.position(), 100);
    }

    #[tokio::test]
    async fn test_update_state_from_advertisements() {
        let transport = FakeTransport::new().with_advertisements(vec![
            advertisement("11:22:33:44:55:66", "000d6340010101"),
            advertisement(&ADDRESS.to_lowercase(), "000d6340321E32"),
        ]);
        let curtain = SwitchbotCurtain::with_config(transport, ADDRESS, &config());

        let applied = assert_ok!(curtain.update_state(Duration::from_millis(10)).await);
        assert_eq!(applied, 1);
        assert_eq!(curtain.battery_percent(), 50);
        assert_eq!(curtain.position(), 30);
        assert_eq!(curtain.light_level(), 50);
        assert!(curtain.state().last_advertisement.is_some());
    }

    #[tokio::test]
    async fn test_update_state_skips_malformed_frames() {
        let transport = FakeTransport::new().with_advertisements(vec![
            advertisement(ADDRESS, "64460a"),
            advertisement(ADDRESS, "1E3"),
            advertisement(ADDRESS, "0d63zz"),
        ]);
        let curtain = SwitchbotCurtain::with_config(transport, ADDRESS, &config());

        let applied = assert_ok!(curtain.update().await);
        assert_eq!(applied, 1);
        assert_eq!(curtain.battery_percent(), 100);
        assert_eq!(curtain.position(), 70);
        assert_eq!(curtain.light_level(), 10);
    }

    #[tokio::test]
    async fn test_update_state_overwrites_optimistic_position() {
        let transport =
            FakeTransport::new().with_advertisements(vec![advertisement(ADDRESS, "5a3203")]);
        let curtain = SwitchbotCurtain::with_config(transport, ADDRESS, &config());

        curtain.close().await;
        assert_eq!(curtain.position(), 100);

        assert_ok!(curtain.update_state(Duration::ZERO).await);
        assert_eq!(curtain.position(), 50);
        assert_eq!(curtain.device().transport().calls.lock().scans, 1);
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert_err!(CurtainAdvertisement::parse(b"abc"));
    }
}
