//! BLE connection management and GATT discovery

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bluetune_core::{internal::EventSender, Device, DeviceId, Event};
use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::BleConfig;
use crate::discovery::describe_peripheral;
use crate::error::BleError;

// ----------------------------------------------------------------------------
// Link Outcomes
// ----------------------------------------------------------------------------

/// Result of a spawned connection attempt
#[derive(Debug)]
pub enum LinkOutcome {
    Connected {
        device: Device,
        peripheral: Peripheral,
    },
    Failed {
        device_id: DeviceId,
        reason: String,
    },
}

pub type LinkOutcomeSender = mpsc::UnboundedSender<LinkOutcome>;
pub type LinkOutcomeReceiver = mpsc::UnboundedReceiver<LinkOutcome>;

// ----------------------------------------------------------------------------
// Link Teardown
// ----------------------------------------------------------------------------

/// The teardown half of a peripheral link
#[async_trait]
pub trait LinkControl: Send + Sync {
    async fn close(&self) -> Result<(), String>;
}

#[async_trait]
impl LinkControl for Peripheral {
    async fn close(&self) -> Result<(), String> {
        self.disconnect().await.map_err(|e| e.to_string())
    }
}

/// Close a link, giving up after `limit`; `true` if the peripheral confirmed
async fn release(device_id: &DeviceId, link: &impl LinkControl, limit: Duration) -> bool {
    match timeout(limit, link.close()).await {
        Ok(Ok(())) => {
            info!("Disconnected from {}", device_id);
            true
        }
        Ok(Err(e)) => {
            warn!("Error disconnecting from {}: {}", device_id, e);
            false
        }
        Err(_) => {
            warn!("Disconnect from {} timed out", device_id);
            false
        }
    }
}

/// A connection attempt in flight
struct PendingAttempt<L> {
    task: JoinHandle<()>,
    link: L,
}

impl<L: LinkControl> PendingAttempt<L> {
    /// Stop the attempt and close whatever it got as far as
    ///
    /// The OS may have brought the link up before the abort lands.
    async fn cancel(self, device_id: &DeviceId, limit: Duration) {
        info!("Cancelling connection attempt to {}", device_id);
        self.task.abort();
        release(device_id, &self.link, limit).await;
    }
}

// ----------------------------------------------------------------------------
// Connection Management
// ----------------------------------------------------------------------------

/// Tracks pending and established links
///
/// Connection attempts run in their own tasks so a slow peripheral never blocks
/// the effect loop. Each attempt reports back through a `LinkOutcome`.
pub struct BleConnection {
    config: BleConfig,
    outcome_sender: LinkOutcomeSender,
    /// Attempts in flight, with the peripheral they target
    pending: HashMap<DeviceId, PendingAttempt<Peripheral>>,
    connected: HashMap<DeviceId, Peripheral>,
}

impl BleConnection {
    pub fn new(config: BleConfig) -> (Self, LinkOutcomeReceiver) {
        let (outcome_sender, outcome_receiver) = mpsc::unbounded_channel();
        let connection = Self {
            config,
            outcome_sender,
            pending: HashMap::new(),
            connected: HashMap::new(),
        };
        (connection, outcome_receiver)
    }

    /// Spawn a connection attempt bounded by the configured timeout
    pub fn begin(&mut self, device_id: DeviceId, peripheral: Peripheral) {
        if self.pending.contains_key(&device_id) || self.connected.contains_key(&device_id) {
            debug!("Connection to {} already in progress", device_id);
            return;
        }

        let outcomes = self.outcome_sender.clone();
        let connect_timeout = self.config.connection_timeout();
        let id = device_id.clone();
        let link = peripheral.clone();

        let handle = tokio::spawn(async move {
            let outcome = match timeout(connect_timeout, peripheral.connect()).await {
                Ok(Ok(())) => match describe_peripheral(&peripheral).await {
                    Ok(device) => LinkOutcome::Connected { device, peripheral },
                    Err(_) => LinkOutcome::Connected {
                        device: Device::new(id, None),
                        peripheral,
                    },
                },
                Ok(Err(e)) => LinkOutcome::Failed {
                    device_id: id,
                    reason: e.to_string(),
                },
                Err(_) => LinkOutcome::Failed {
                    device_id: id,
                    reason: BleError::ConnectionTimeout.to_string(),
                },
            };
            // Receiver only goes away when the adapter task stops
            let _ = outcomes.send(outcome);
        });

        self.pending.insert(device_id, PendingAttempt { task: handle, link });
    }

    /// Settle a finished attempt
    ///
    /// Returns `true` when the link is kept. A link whose attempt was cancelled
    /// in the meantime is torn down instead.
    pub async fn settle(&mut self, device: &Device, peripheral: Peripheral) -> bool {
        if self.pending.remove(&device.id).is_none() {
            warn!("Dropping link to {} after its attempt was cancelled", device);
            release(&device.id, &peripheral, self.config.disconnect_timeout()).await;
            return false;
        }
        info!("Connected to {}", device);
        self.connected.insert(device.id.clone(), peripheral);
        true
    }

    /// Forget a failed attempt; `false` if it was already cancelled
    pub fn fail(&mut self, device_id: &DeviceId) -> bool {
        self.pending.remove(device_id).is_some()
    }

    /// Cancel a pending attempt or tear down a live link
    pub async fn disconnect(&mut self, device_id: &DeviceId) {
        let limit = self.config.disconnect_timeout();
        if let Some(attempt) = self.pending.remove(device_id) {
            attempt.cancel(device_id, limit).await;
            return;
        }

        let Some(peripheral) = self.connected.remove(device_id) else {
            debug!("Disconnect for {} with no link", device_id);
            return;
        };
        release(device_id, &peripheral, limit).await;
    }

    /// Adapter reported a dropped link; `true` if it was one we held
    pub fn link_lost(&mut self, device_id: &DeviceId) -> bool {
        self.connected.remove(device_id).is_some()
    }

    /// Tear down everything on shutdown
    pub async fn close_all(&mut self) {
        let limit = self.config.disconnect_timeout();
        for (device_id, attempt) in self.pending.drain() {
            attempt.cancel(&device_id, limit).await;
        }
        for (device_id, peripheral) in self.connected.drain() {
            release(&device_id, &peripheral, limit).await;
        }
    }
}

// ----------------------------------------------------------------------------
// GATT Discovery
// ----------------------------------------------------------------------------

/// Enumerate services and their characteristics on a fresh link
///
/// Reports one `ServicesDiscovered` followed by one `CharacteristicsDiscovered`
/// per service. Nothing is read or written.
pub async fn discover_gatt(peripheral: Peripheral, device_id: DeviceId, events: EventSender) {
    if let Err(e) = peripheral.discover_services().await {
        error!("Failed to discover services for {}: {}", device_id, e);
        let _ = events
            .send(Event::ServicesDiscovered {
                device_id,
                services: Vec::new(),
                error: Some(e.to_string()),
            })
            .await;
        return;
    }

    let services = peripheral.services();
    let sent = events
        .send(Event::ServicesDiscovered {
            device_id: device_id.clone(),
            services: services.iter().map(|s| s.uuid).collect(),
            error: None,
        })
        .await;
    if sent.is_err() {
        return;
    }

    for service in services {
        let event = Event::CharacteristicsDiscovered {
            device_id: device_id.clone(),
            service: service.uuid,
            characteristics: service.characteristics.iter().map(|c| c.uuid).collect(),
            error: None,
        };
        if events.send(event).await.is_err() {
            return;
        }
    }
    debug!("GATT discovery finished for {}", device_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;

    /// Counts close requests; optionally never answers
    #[derive(Clone, Default)]
    struct FakeLink {
        closes: Arc<AtomicUsize>,
        hang: bool,
    }

    #[async_trait]
    impl LinkControl for FakeLink {
        async fn close(&self) -> Result<(), String> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                futures::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancel_aborts_attempt_and_closes_link() {
        let link = FakeLink::default();
        let (alive, aborted) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _alive = alive;
            futures::future::pending::<()>().await;
        });

        let attempt = PendingAttempt {
            task,
            link: link.clone(),
        };
        attempt
            .cancel(&DeviceId::new("A"), Duration::from_secs(1))
            .await;

        // The sender is dropped with the aborted task
        assert!(aborted.await.is_err());
        assert_eq!(link.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_gives_up_after_limit() {
        let link = FakeLink {
            hang: true,
            ..FakeLink::default()
        };
        let released = timeout(
            Duration::from_secs(1),
            release(&DeviceId::new("A"), &link, Duration::from_millis(20)),
        )
        .await
        .expect("release ignored its limit");
        assert!(!released);
        assert_eq!(link.closes.load(Ordering::SeqCst), 1);
    }
}
