//! BLE adapter initialization and device scanning

use std::pin::Pin;

use bluetune_core::{Device, DeviceId, PowerState};
use btleplug::api::{
    Central, CentralEvent, CentralState, Manager as _, Peripheral as _, PeripheralProperties,
    ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::Stream;
use tracing::{debug, info};

use crate::config::BleConfig;
use crate::error::{BleError, BleResult};

/// Stream of adapter notifications
pub type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

// ----------------------------------------------------------------------------
// Discovery Implementation
// ----------------------------------------------------------------------------

/// Owns the host adapter and handles scanning
pub struct BleDiscovery {
    config: BleConfig,
    adapter: Option<Adapter>,
    scanning: bool,
}

impl BleDiscovery {
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            adapter: None,
            scanning: false,
        }
    }

    /// Pick the configured adapter from the host
    pub async fn initialize_adapter(&mut self) -> BleResult<()> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;

        if adapters.is_empty() {
            return Err(BleError::AdapterNotAvailable);
        }

        let available = adapters.len();
        let adapter = adapters
            .into_iter()
            .nth(self.config.adapter_index)
            .ok_or(BleError::AdapterIndexOutOfRange {
                index: self.config.adapter_index,
                available,
            })?;

        match adapter.adapter_info().await {
            Ok(info) => info!("BLE adapter initialized: {}", info),
            Err(_) => info!("BLE adapter initialized"),
        }
        self.adapter = Some(adapter);
        Ok(())
    }

    fn adapter(&self) -> BleResult<&Adapter> {
        self.adapter.as_ref().ok_or(BleError::AdapterNotAvailable)
    }

    pub async fn power_state(&self) -> BleResult<PowerState> {
        let state = self.adapter()?.adapter_state().await?;
        Ok(power_state_from(state))
    }

    pub async fn events(&self) -> BleResult<CentralEvents> {
        self.adapter()?
            .events()
            .await
            .map_err(|e| BleError::EventStreamFailed(e.to_string()))
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub async fn start_scanning(&mut self) -> BleResult<()> {
        let filter = ScanFilter {
            services: self.config.service_filter.clone(),
        };
        self.adapter()?.start_scan(filter).await?;
        self.scanning = true;

        if self.config.service_filter.is_empty() {
            info!("Started BLE scanning for all peripherals");
        } else {
            info!(
                "Started BLE scanning for {} services",
                self.config.service_filter.len()
            );
        }
        Ok(())
    }

    pub async fn stop_scanning(&mut self) -> BleResult<()> {
        self.scanning = false;
        if let Some(adapter) = &self.adapter {
            adapter.stop_scan().await?;
            info!("Stopped BLE scanning");
        }
        Ok(())
    }

    /// Look up a peripheral the adapter has already seen
    pub async fn peripheral(&self, device_id: &DeviceId) -> BleResult<Peripheral> {
        let peripherals = self.adapter()?.peripherals().await?;
        peripherals
            .into_iter()
            .find(|p| p.id().to_string() == device_id.as_str())
            .ok_or_else(|| BleError::PeripheralNotFound {
                device_id: device_id.clone(),
            })
    }

    /// Snapshot a peripheral's advertisement as a `Device`
    pub async fn describe(&self, id: &PeripheralId) -> BleResult<Device> {
        let peripheral = self.adapter()?.peripheral(id).await?;
        describe_peripheral(&peripheral).await
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

pub fn device_id_of(id: &PeripheralId) -> DeviceId {
    DeviceId::new(id.to_string())
}

pub async fn describe_peripheral(peripheral: &Peripheral) -> BleResult<Device> {
    let properties = peripheral.properties().await?;
    let device = device_from_properties(device_id_of(&peripheral.id()), properties.as_ref());
    debug!("Peripheral {} advertised as {}", device.id, device.display_name());
    Ok(device)
}

/// Name and signal strength from an advertisement, if any was received
pub fn device_from_properties(id: DeviceId, properties: Option<&PeripheralProperties>) -> Device {
    let Some(properties) = properties else {
        return Device::new(id, None);
    };
    let name = properties
        .local_name
        .as_ref()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let device = Device::new(id, name);
    match properties.rssi {
        Some(rssi) => device.with_rssi(rssi),
        None => device,
    }
}

pub fn power_state_from(state: CentralState) -> PowerState {
    match state {
        CentralState::PoweredOn => PowerState::PoweredOn,
        CentralState::PoweredOff => PowerState::PoweredOff,
        _ => PowerState::Unknown,
    }
}
