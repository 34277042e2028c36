//! Simulated BLE adapter
//!
//! Scripted stand-in for the host adapter, used by `--simulate` and by tests
//! that need the full event sequence without radio hardware.

use std::time::Duration;

use async_trait::async_trait;
use bluetune_core::{
    internal::{EffectReceiver, EventSender},
    BluetuneResult, Device, DeviceId, Effect, Event, PowerState, SessionTask, TaskKind,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{BleError, BleResult};

/// Generic Access and Generic Attribute, present on every real peripheral
const GAP_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
const GATT_SERVICE: Uuid = Uuid::from_u128(0x00001801_0000_1000_8000_00805f9b34fb);
const DEVICE_NAME_CHARACTERISTIC: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);
const APPEARANCE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x00002a01_0000_1000_8000_00805f9b34fb);
const SERVICE_CHANGED_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0x00002a05_0000_1000_8000_00805f9b34fb);

// ----------------------------------------------------------------------------
// Scripted Peripherals
// ----------------------------------------------------------------------------

/// How a simulated peripheral answers a connection request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectBehavior {
    Accept,
    Reject(String),
    /// Never answers; the attempt times out
    Ignore,
}

/// A peripheral the simulated adapter can discover and connect to
#[derive(Debug, Clone)]
pub struct SimulatedPeripheral {
    pub device: Device,
    pub connect: ConnectBehavior,
    /// GATT table reported after connecting
    pub services: Vec<(Uuid, Vec<Uuid>)>,
}

impl SimulatedPeripheral {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            connect: ConnectBehavior::Accept,
            services: vec![
                (
                    GAP_SERVICE,
                    vec![DEVICE_NAME_CHARACTERISTIC, APPEARANCE_CHARACTERISTIC],
                ),
                (GATT_SERVICE, vec![SERVICE_CHANGED_CHARACTERISTIC]),
            ],
        }
    }

    pub fn rejecting(mut self, reason: impl Into<String>) -> Self {
        self.connect = ConnectBehavior::Reject(reason.into());
        self
    }

    pub fn unresponsive(mut self) -> Self {
        self.connect = ConnectBehavior::Ignore;
        self
    }

    pub fn with_services(mut self, services: Vec<(Uuid, Vec<Uuid>)>) -> Self {
        self.services = services;
        self
    }
}

/// A handful of nearby devices for demos
pub fn demo_peripherals() -> Vec<SimulatedPeripheral> {
    vec![
        SimulatedPeripheral::new(
            Device::new("5C:F3:70:A1:00:01", Some("Kitchen Speaker".to_string())).with_rssi(-48),
        ),
        SimulatedPeripheral::new(
            Device::new("5C:F3:70:A1:00:02", Some("Headphones".to_string())).with_rssi(-63),
        ),
        SimulatedPeripheral::new(Device::new("5C:F3:70:A1:00:03", None).with_rssi(-81)),
        SimulatedPeripheral::new(
            Device::new("5C:F3:70:A1:00:04", Some("Old Tracker".to_string())).with_rssi(-90),
        )
        .rejecting("peer removed pairing information"),
    ]
}

// ----------------------------------------------------------------------------
// Control Handle
// ----------------------------------------------------------------------------

#[derive(Debug)]
enum Control {
    Power(PowerState),
    DropLink(String),
}

/// Pokes the simulated radio from outside the session
#[derive(Debug, Clone)]
pub struct SimulatorControl {
    sender: mpsc::UnboundedSender<Control>,
}

impl SimulatorControl {
    /// Change the reported power state
    pub fn set_power(&self, state: PowerState) -> BleResult<()> {
        self.sender
            .send(Control::Power(state))
            .map_err(|_| BleError::ChannelClosed)
    }

    /// Drop the live link as if the peripheral walked out of range
    pub fn drop_link(&self, reason: impl Into<String>) -> BleResult<()> {
        self.sender
            .send(Control::DropLink(reason.into()))
            .map_err(|_| BleError::ChannelClosed)
    }
}

// ----------------------------------------------------------------------------
// Simulated Adapter Task
// ----------------------------------------------------------------------------

/// Timing of the simulated radio
#[derive(Debug, Clone)]
pub struct SimulatorTiming {
    /// Delay before a connection attempt resolves
    pub connect_delay: Duration,
    /// How long an ignored attempt waits before failing
    pub connection_timeout: Duration,
    /// Interval between repeat advertisements while scanning
    pub advertise_interval: Duration,
}

impl Default for SimulatorTiming {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(300),
            connection_timeout: Duration::from_secs(10),
            advertise_interval: Duration::from_secs(1),
        }
    }
}

impl SimulatorTiming {
    /// Near-instant timing for tests
    pub fn fast() -> Self {
        Self {
            connect_delay: Duration::from_millis(5),
            connection_timeout: Duration::from_millis(50),
            advertise_interval: Duration::from_millis(20),
        }
    }
}

/// Capability task that plays a scripted radio environment
pub struct SimulatedAdapterTask {
    peripherals: Vec<SimulatedPeripheral>,
    power: PowerState,
    timing: SimulatorTiming,
    event_sender: Option<EventSender>,
    effect_receiver: Option<EffectReceiver>,
    control_receiver: mpsc::UnboundedReceiver<Control>,
    control_sender: mpsc::UnboundedSender<Control>,
    scanning: bool,
    pending: Option<(DeviceId, Instant)>,
    connected: Option<DeviceId>,
}

impl SimulatedAdapterTask {
    pub fn new(peripherals: Vec<SimulatedPeripheral>) -> Self {
        let (control_sender, control_receiver) = mpsc::unbounded_channel();
        Self {
            peripherals,
            power: PowerState::PoweredOn,
            timing: SimulatorTiming::default(),
            event_sender: None,
            effect_receiver: None,
            control_receiver,
            control_sender,
            scanning: false,
            pending: None,
            connected: None,
        }
    }

    pub fn with_power(mut self, power: PowerState) -> Self {
        self.power = power;
        self
    }

    pub fn with_timing(mut self, timing: SimulatorTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn control(&self) -> SimulatorControl {
        SimulatorControl {
            sender: self.control_sender.clone(),
        }
    }

    fn peripheral(&self, device_id: &DeviceId) -> Option<&SimulatedPeripheral> {
        self.peripherals.iter().find(|p| &p.device.id == device_id)
    }

    async fn emit(&self, event: Event) -> BleResult<()> {
        let sender = self.event_sender.as_ref().ok_or(BleError::NotAttached)?;
        sender.send(event).await.map_err(|_| BleError::ChannelClosed)
    }

    async fn advertise(&self) -> BleResult<()> {
        for peripheral in &self.peripherals {
            self.emit(Event::DeviceDiscovered {
                device: peripheral.device.clone(),
            })
            .await?;
        }
        Ok(())
    }

    async fn run_internal(&mut self) -> BleResult<()> {
        info!(
            "Simulated BLE adapter starting with {} peripherals",
            self.peripherals.len()
        );

        let mut effect_receiver = self.effect_receiver.take().ok_or(BleError::NotAttached)?;
        self.emit(Event::AdapterStateChanged { state: self.power })
            .await?;

        let mut advertise = tokio::time::interval(self.timing.advertise_interval);
        advertise.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let deadline = self.pending.as_ref().map(|(_, at)| *at);

            tokio::select! {
                effect = effect_receiver.recv() => {
                    match effect {
                        Ok(effect) if effect.target() == TaskKind::Bluetooth => {
                            self.process_effect(effect).await?;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Simulated adapter lagged, {} effects skipped", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                Some(control) = self.control_receiver.recv() => {
                    self.process_control(control).await?;
                }

                _ = advertise.tick(), if self.scanning => {
                    self.advertise().await?;
                }

                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.resolve_pending().await?;
                }
            }
        }

        info!("Simulated BLE adapter stopped");
        Ok(())
    }

    async fn process_effect(&mut self, effect: Effect) -> BleResult<()> {
        match effect {
            Effect::StartScan => {
                if !self.power.is_powered_on() {
                    self.emit(Event::ScanFailed {
                        reason: format!("adapter is {}", self.power),
                    })
                    .await?;
                    return Ok(());
                }
                debug!("Simulated scan started");
                self.scanning = true;
                self.advertise().await?;
            }
            Effect::StopScan => {
                self.scanning = false;
            }
            Effect::Connect { device_id } => {
                let Some(peripheral) = self.peripheral(&device_id) else {
                    self.emit(Event::ConnectionFailed {
                        reason: BleError::PeripheralNotFound {
                            device_id: device_id.clone(),
                        }
                        .to_string(),
                        device_id,
                    })
                    .await?;
                    return Ok(());
                };
                let wait = match peripheral.connect {
                    ConnectBehavior::Ignore => self.timing.connection_timeout,
                    _ => self.timing.connect_delay,
                };
                self.pending = Some((device_id, Instant::now() + wait));
            }
            Effect::Disconnect { device_id } => {
                if self.pending.as_ref().is_some_and(|(id, _)| id == &device_id) {
                    self.pending = None;
                }
                if self.connected.as_ref() == Some(&device_id) {
                    self.connected = None;
                }
                self.emit(Event::Disconnected {
                    device_id,
                    error: None,
                })
                .await?;
            }
            Effect::PlayAudio { .. } | Effect::StopAudio => {}
        }
        Ok(())
    }

    async fn resolve_pending(&mut self) -> BleResult<()> {
        let Some((device_id, _)) = self.pending.take() else {
            return Ok(());
        };
        let Some(peripheral) = self.peripheral(&device_id).cloned() else {
            return Ok(());
        };

        match peripheral.connect {
            ConnectBehavior::Accept => {
                self.connected = Some(device_id.clone());
                self.emit(Event::Connected {
                    device: peripheral.device.clone(),
                })
                .await?;
                self.emit(Event::ServicesDiscovered {
                    device_id: device_id.clone(),
                    services: peripheral.services.iter().map(|(s, _)| *s).collect(),
                    error: None,
                })
                .await?;
                for (service, characteristics) in peripheral.services {
                    self.emit(Event::CharacteristicsDiscovered {
                        device_id: device_id.clone(),
                        service,
                        characteristics,
                        error: None,
                    })
                    .await?;
                }
            }
            ConnectBehavior::Reject(reason) => {
                self.emit(Event::ConnectionFailed { device_id, reason })
                    .await?;
            }
            ConnectBehavior::Ignore => {
                self.emit(Event::ConnectionFailed {
                    device_id,
                    reason: BleError::ConnectionTimeout.to_string(),
                })
                .await?;
            }
        }
        Ok(())
    }

    async fn process_control(&mut self, control: Control) -> BleResult<()> {
        match control {
            Control::Power(state) => {
                self.power = state;
                self.emit(Event::AdapterStateChanged { state }).await?;
                if !state.is_powered_on() {
                    self.scanning = false;
                    if let Some((device_id, _)) = self.pending.take() {
                        self.emit(Event::ConnectionFailed {
                            device_id,
                            reason: format!("adapter is {}", state),
                        })
                        .await?;
                    }
                    if let Some(device_id) = self.connected.take() {
                        self.emit(Event::Disconnected {
                            device_id,
                            error: Some(format!("adapter is {}", state)),
                        })
                        .await?;
                    }
                }
            }
            Control::DropLink(reason) => {
                if let Some(device_id) = self.connected.take() {
                    info!("Simulating link loss to {}", device_id);
                    self.emit(Event::Disconnected {
                        device_id,
                        error: Some(reason),
                    })
                    .await?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionTask for SimulatedAdapterTask {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> BluetuneResult<()> {
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> BluetuneResult<()> {
        self.run_internal().await.map_err(Into::into)
    }

    fn task_kind(&self) -> TaskKind {
        TaskKind::Bluetooth
    }
}
