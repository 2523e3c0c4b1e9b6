// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # switchbot-rust-ble
//!
//! A cross-platform Rust library for controlling Switchbot devices via
//! Bluetooth Low Energy.
//!
//! Two device families are supported:
//!
//! - **Bot** ([`Switchbot`]): press, or turn on/off in switch mode
//! - **Curtain** ([`SwitchbotCurtain`]): open, close, stop, set position, and
//!   read position, battery and light level from advertisements
//!
//! ## Features
//!
//! - **Password support**: Commands are sent in the firmware's
//!   password-challenge form when a password is configured
//! - **Retries**: Every command is retried with a fixed backoff until the
//!   device acknowledges it or the retry budget runs out
//! - **Passive state**: Curtain state is decoded from advertisements without
//!   connecting
//! - **Pluggable transport**: Device logic runs over any [`BleTransport`];
//!   [`BtleplugTransport`] is the platform implementation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use switchbot_rust_ble::{BtleplugTransport, DeviceConfig, Result, SwitchbotCurtain};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let transport = BtleplugTransport::new().await?;
//!     let config = DeviceConfig::default().with_reverse_mode(true);
//!     let curtain = SwitchbotCurtain::with_config(transport, "E4:5A:0A:1B:2C:3D", &config);
//!
//!     if !curtain.set_position(60).await {
//!         println!("Curtain did not acknowledge the command");
//!     }
//!
//!     curtain.update().await?;
//!     println!(
//!         "Position {}%, battery {}%",
//!         curtain.position(),
//!         curtain.battery_percent()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps. CoreBluetooth hides device
//! addresses, so address lookup does not work there.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group. The
//! interface index selects the `hciN` adapter.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for configuration and state types

// Public modules
pub mod ble;
pub mod bot;
pub mod curtain;
pub mod device;
pub mod error;
pub mod protocol;
pub mod utils;

// Re-exports for convenience
pub use bot::Switchbot;
pub use curtain::{CurtainState, SwitchbotCurtain, DEFAULT_SCAN_TIMEOUT};
pub use device::{DeviceConfig, DeviceIdentity, SwitchbotDevice};
pub use error::{Error, Result};
pub use utils::addresses_match;

// Re-export commonly used types from submodules
pub use ble::connection::{
    ConnectionState, DeviceSession, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY,
};
pub use ble::platform::BtleplugTransport;
pub use ble::transport::{AddressType, Advertisement, AdvertisementField, BleTransport};
pub use protocol::{CommandKey, CurtainAdvertisement, EncodedPassword};
