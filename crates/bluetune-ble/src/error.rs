//! Error types for the BLE adapter

use bluetune_core::{BluetuneError, DeviceId};
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE adapter task
#[derive(Error, Debug)]
pub enum BleError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("No BLE adapter at index {index} ({available} available)")]
    AdapterIndexOutOfRange { index: usize, available: usize },

    #[error("Peripheral not found: {device_id}")]
    PeripheralNotFound { device_id: DeviceId },

    #[error("Connection timed out")]
    ConnectionTimeout,

    #[error("Failed to get BLE events: {0}")]
    EventStreamFailed(String),

    #[error("Task started without channels")]
    NotAttached,

    #[error("Event channel closed")]
    ChannelClosed,

    #[error("Bluetooth error: {0}")]
    Btleplug(#[from] btleplug::Error),
}

impl From<BleError> for BluetuneError {
    fn from(err: BleError) -> Self {
        match err {
            BleError::NotAttached | BleError::ChannelClosed => {
                BluetuneError::channel(err.to_string())
            }
            other => BluetuneError::adapter(other.to_string()),
        }
    }
}

pub type BleResult<T> = Result<T, BleError>;
