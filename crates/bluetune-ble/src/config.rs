//! BLE adapter configuration

use std::time::Duration;

use bluetune_core::{BluetuneError, BluetuneResult};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Configuration for the BLE adapter task
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Restrict scanning to peripherals advertising one of these services;
    /// empty scans for everything
    pub service_filter: Vec<Uuid>,
    /// Maximum time to wait for a connection, in milliseconds
    pub connection_timeout_ms: u64,
    /// Maximum time to wait for a requested disconnect, in milliseconds
    pub disconnect_timeout_ms: u64,
    /// Which of the host's adapters to use
    pub adapter_index: usize,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            service_filter: Vec::new(),
            connection_timeout_ms: 10_000,
            disconnect_timeout_ms: 3_000,
            adapter_index: 0,
        }
    }
}

impl BleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_service_filter(mut self, services: Vec<Uuid>) -> Self {
        self.service_filter = services;
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_adapter_index(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    pub fn validate(&self) -> BluetuneResult<()> {
        if self.connection_timeout_ms == 0 {
            return Err(BluetuneError::configuration(
                "ble.connection_timeout_ms must be greater than 0",
            ));
        }
        if self.disconnect_timeout_ms == 0 {
            return Err(BluetuneError::configuration(
                "ble.disconnect_timeout_ms must be greater than 0",
            ));
        }
        Ok(())
    }
}
