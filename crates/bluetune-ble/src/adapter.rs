//! BLE Adapter Task Implementation

use async_trait::async_trait;
use bluetune_core::{
    internal::{EffectReceiver, EventSender},
    BluetuneResult, Effect, Event, PowerState, SessionTask, TaskKind,
};
use btleplug::api::CentralEvent;
use futures::StreamExt;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, trace, warn};

use crate::config::BleConfig;
use crate::connection::{discover_gatt, BleConnection, LinkOutcome, LinkOutcomeReceiver};
use crate::discovery::{device_id_of, power_state_from, BleDiscovery};
use crate::error::{BleError, BleResult};

/// Reported for links the adapter drops on its own
const LINK_LOST: &str = "connection lost";

// ----------------------------------------------------------------------------
// BLE Adapter Task
// ----------------------------------------------------------------------------

/// Capability task driving the host Bluetooth adapter through btleplug
pub struct BleAdapterTask {
    config: BleConfig,
    event_sender: Option<EventSender>,
    effect_receiver: Option<EffectReceiver>,
    discovery: BleDiscovery,
    connection: BleConnection,
    link_outcomes: Option<LinkOutcomeReceiver>,
    running: bool,
}

impl Default for BleAdapterTask {
    fn default() -> Self {
        Self::new(BleConfig::default())
    }
}

impl BleAdapterTask {
    pub fn new(config: BleConfig) -> Self {
        let discovery = BleDiscovery::new(config.clone());
        let (connection, link_outcomes) = BleConnection::new(config.clone());
        Self {
            config,
            event_sender: None,
            effect_receiver: None,
            discovery,
            connection,
            link_outcomes: Some(link_outcomes),
            running: false,
        }
    }

    pub fn config(&self) -> &BleConfig {
        &self.config
    }

    async fn emit(&self, event: Event) -> BleResult<()> {
        let sender = self.event_sender.as_ref().ok_or(BleError::NotAttached)?;
        sender.send(event).await.map_err(|_| BleError::ChannelClosed)
    }

    /// Main loop: effects in, adapter notifications and link outcomes out
    async fn run_internal(&mut self) -> BleResult<()> {
        info!("BLE adapter task starting");

        let mut effect_receiver = self.effect_receiver.take().ok_or(BleError::NotAttached)?;
        let mut link_outcomes = self.link_outcomes.take().ok_or(BleError::NotAttached)?;

        if let Err(e) = self.discovery.initialize_adapter().await {
            error!("Failed to initialize BLE adapter: {}", e);
            self.emit(Event::AdapterStateChanged {
                state: PowerState::Unavailable,
            })
            .await?;
            self.emit(Event::AdapterError {
                reason: e.to_string(),
            })
            .await?;
            return Err(e);
        }

        let mut central_events = self.discovery.events().await?;

        let initial = match self.discovery.power_state().await {
            Ok(state) => state,
            Err(e) => {
                warn!("Could not read adapter state: {}", e);
                PowerState::Unknown
            }
        };
        self.emit(Event::AdapterStateChanged { state: initial }).await?;

        self.running = true;

        while self.running {
            tokio::select! {
                effect = effect_receiver.recv() => {
                    match effect {
                        Ok(effect) if effect.target() == TaskKind::Bluetooth => {
                            self.process_effect(effect).await?;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("BLE task lagged, {} effects skipped", skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("Effect channel closed, shutting down");
                            break;
                        }
                    }
                }

                central_event = central_events.next() => {
                    match central_event {
                        Some(event) => self.process_central_event(event).await?,
                        None => {
                            warn!("BLE event stream ended");
                            self.emit(Event::AdapterError {
                                reason: "adapter event stream ended".to_string(),
                            })
                            .await?;
                            break;
                        }
                    }
                }

                Some(outcome) = link_outcomes.recv() => {
                    self.process_link_outcome(outcome).await?;
                }
            }
        }

        self.connection.close_all().await;
        if self.discovery.is_scanning() {
            let _ = self.discovery.stop_scanning().await;
        }
        info!("BLE adapter task stopped");
        Ok(())
    }

    /// Channel failures propagate; adapter failures become events
    async fn process_effect(&mut self, effect: Effect) -> BleResult<()> {
        match effect {
            Effect::StartScan => {
                if let Err(e) = self.discovery.start_scanning().await {
                    error!("Failed to start BLE scan: {}", e);
                    self.emit(Event::ScanFailed {
                        reason: e.to_string(),
                    })
                    .await?;
                }
            }
            Effect::StopScan => {
                if let Err(e) = self.discovery.stop_scanning().await {
                    warn!("Failed to stop BLE scan: {}", e);
                }
            }
            Effect::Connect { device_id } => match self.discovery.peripheral(&device_id).await {
                Ok(peripheral) => {
                    info!("Connecting to {}", device_id);
                    self.connection.begin(device_id, peripheral);
                }
                Err(e) => {
                    self.emit(Event::ConnectionFailed {
                        device_id,
                        reason: e.to_string(),
                    })
                    .await?;
                }
            },
            Effect::Disconnect { device_id } => {
                self.connection.disconnect(&device_id).await;
                // The session waits in Disconnecting for this
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

    async fn process_central_event(&mut self, event: CentralEvent) -> BleResult<()> {
        match event {
            CentralEvent::StateUpdate(state) => {
                self.emit(Event::AdapterStateChanged {
                    state: power_state_from(state),
                })
                .await?;
            }
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                if !self.discovery.is_scanning() {
                    return Ok(());
                }
                match self.discovery.describe(&id).await {
                    Ok(device) => self.emit(Event::DeviceDiscovered { device }).await?,
                    Err(e) => trace!("Skipping advertisement from {:?}: {}", id, e),
                }
            }
            CentralEvent::DeviceDisconnected(id) => {
                let device_id = device_id_of(&id);
                if self.connection.link_lost(&device_id) {
                    warn!("Link to {} lost", device_id);
                    self.emit(Event::Disconnected {
                        device_id,
                        error: Some(LINK_LOST.to_string()),
                    })
                    .await?;
                }
            }
            other => debug!("Ignoring adapter event {:?}", other),
        }
        Ok(())
    }

    async fn process_link_outcome(&mut self, outcome: LinkOutcome) -> BleResult<()> {
        match outcome {
            LinkOutcome::Connected { device, peripheral } => {
                if !self.connection.settle(&device, peripheral.clone()).await {
                    return Ok(());
                }
                let device_id = device.id.clone();
                self.emit(Event::Connected { device }).await?;

                let events = self.event_sender.clone().ok_or(BleError::NotAttached)?;
                tokio::spawn(discover_gatt(peripheral, device_id, events));
            }
            LinkOutcome::Failed { device_id, reason } => {
                if !self.connection.fail(&device_id) {
                    debug!("Ignoring failure of cancelled attempt to {}", device_id);
                    return Ok(());
                }
                error!("Failed to connect to {}: {}", device_id, reason);
                self.emit(Event::ConnectionFailed { device_id, reason }).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SessionTask for BleAdapterTask {
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
