//! Error types for the switchbot-rust-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No adapter exists at the requested interface index.
    #[error("Bluetooth adapter not found: hci{index}")]
    AdapterNotFound {
        /// The interface index that was requested.
        index: u32,
    },

    /// The device was not seen by the adapter.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was searched for.
        address: String,
    },

    /// Failed to establish a connection to the device.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// The command write was rejected or not acknowledged.
    #[error("Write failed: {reason}")]
    WriteFailed {
        /// Description of why the write failed.
        reason: String,
    },

    /// Disconnecting from the device failed.
    #[error("Disconnect failed: {reason}")]
    DisconnectFailed {
        /// Description of why the disconnect failed.
        reason: String,
    },

    /// Service not found on the device.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// Characteristic not found on the device.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// An advertisement frame could not be decoded.
    #[error("Malformed advertisement: {context}")]
    MalformedAdvertisement {
        /// Description of what was wrong with the frame.
        context: String,
    },

    /// A command payload was not valid hexadecimal.
    #[error("Invalid payload: {context}")]
    InvalidPayload {
        /// Description of what was invalid about the payload.
        context: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
