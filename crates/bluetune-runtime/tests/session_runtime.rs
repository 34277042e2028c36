//! Integration tests for the session runtime
//!
//! A loopback capability task answers effects with the events a healthy adapter
//! and audio engine would produce, so the whole command → effect → event → app
//! event path runs through real channels.

use std::time::Duration;

use bluetune_core::{
    internal::{EffectReceiver, EventSender},
    AppEvent, BluetuneError, BluetuneResult, ConnectionStatus, Device, DeviceId, Effect, Event, PowerState,
    SessionError, SessionSnapshot, SessionTask, TaskKind,
};
use bluetune_runtime::{builder::create_test_runtime, RuntimeHandle, SessionManager};
use proptest::prelude::*;
use tokio::sync::broadcast::error::RecvError;
use tokio_test::assert_ok;

// ----------------------------------------------------------------------------
// Loopback Task
// ----------------------------------------------------------------------------

/// Answers every effect with the matching success event
struct LoopbackTask {
    devices: Vec<Device>,
    audio_ready: bool,
    event_sender: Option<EventSender>,
    effect_receiver: Option<EffectReceiver>,
}

impl LoopbackTask {
    fn new(devices: Vec<Device>) -> Self {
        Self {
            devices,
            audio_ready: true,
            event_sender: None,
            effect_receiver: None,
        }
    }

    fn without_audio(mut self) -> Self {
        self.audio_ready = false;
        self
    }
}

#[async_trait::async_trait]
impl SessionTask for LoopbackTask {
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
        let events = self
            .event_sender
            .clone()
            .ok_or_else(|| BluetuneError::channel("not attached"))?;
        let mut effects = self
            .effect_receiver
            .take()
            .ok_or_else(|| BluetuneError::channel("not attached"))?;

        let send = |event: Event| {
            let events = events.clone();
            async move {
                events
                    .send(event)
                    .await
                    .map_err(|_| BluetuneError::channel("event channel closed"))
            }
        };

        send(Event::AdapterStateChanged {
            state: PowerState::PoweredOn,
        })
        .await?;
        if self.audio_ready {
            send(Event::AudioReady {
                clip: "song.mp3".to_string(),
            })
            .await?;
        } else {
            send(Event::AudioLoadFailed {
                reason: "song.mp3 not found".to_string(),
            })
            .await?;
        }

        loop {
            let effect = match effects.recv().await {
                Ok(effect) => effect,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Ok(()),
            };
            match effect {
                Effect::StartScan => {
                    for device in &self.devices {
                        send(Event::DeviceDiscovered {
                            device: device.clone(),
                        })
                        .await?;
                    }
                }
                Effect::Connect { device_id } => {
                    let device = self
                        .devices
                        .iter()
                        .find(|d| d.id == device_id)
                        .cloned()
                        .unwrap_or_else(|| Device::new(device_id, None));
                    send(Event::Connected { device }).await?;
                }
                Effect::Disconnect { device_id } => {
                    send(Event::Disconnected {
                        device_id,
                        error: None,
                    })
                    .await?;
                }
                Effect::StopScan | Effect::PlayAudio { .. } | Effect::StopAudio => {}
            }
        }
    }

    fn task_kind(&self) -> TaskKind {
        TaskKind::Bluetooth
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

fn speaker() -> Device {
    Device::new("AA:BB:CC:DD:EE:01", Some("Speaker".to_string())).with_rssi(-48)
}

fn headset() -> Device {
    Device::new("AA:BB:CC:DD:EE:02", Some("Headset".to_string())).with_rssi(-70)
}

async fn wait_for(
    runtime: &RuntimeHandle,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut snapshots = runtime.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(2), snapshots.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot channel closed")
        .clone();
    snapshot
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_scan_connect_play_disconnect_cycle() {
    let task = LoopbackTask::new(vec![speaker(), headset()]);
    let mut runtime = create_test_runtime(vec![Box::new(task)]).await.unwrap();

    wait_for(&runtime, |s| {
        s.adapter_state == PowerState::PoweredOn && s.is_audio_ready
    })
    .await;

    runtime.start_scanning().await.unwrap();
    let snapshot = wait_for(&runtime, |s| s.devices.len() == 2).await;
    assert!(snapshot.is_scanning);

    runtime.connect(speaker().id).await.unwrap();
    let snapshot = wait_for(&runtime, |s| s.is_playing).await;
    assert_eq!(snapshot.connected_device(), Some(&speaker()));
    assert!(!snapshot.is_scanning);

    runtime.disconnect().await.unwrap();
    let snapshot = wait_for(&runtime, |s| s.connection.status() == ConnectionStatus::Disconnected).await;
    assert!(!snapshot.is_playing);
    assert!(snapshot.last_error.is_none());

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_connect_without_audio_does_not_play() {
    let task = LoopbackTask::new(vec![speaker()]).without_audio();
    let mut runtime = create_test_runtime(vec![Box::new(task)]).await.unwrap();

    wait_for(&runtime, |s| s.last_error.is_some()).await;
    runtime.start_scanning().await.unwrap();
    wait_for(&runtime, |s| !s.devices.is_empty()).await;

    runtime.connect(speaker().id).await.unwrap();
    let snapshot = wait_for(&runtime, |s| s.connection.is_connected()).await;
    assert!(!snapshot.is_playing);
    assert!(!snapshot.is_audio_ready);

    runtime.play_audio().await.unwrap();
    runtime.stop_scanning().await.unwrap();
    let snapshot = runtime.snapshot();
    assert!(!snapshot.is_playing);

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_effects_are_broadcast_to_observers() {
    let task = LoopbackTask::new(vec![speaker()]);
    let mut runtime = create_test_runtime(vec![Box::new(task)]).await.unwrap();
    let mut effects = runtime.subscribe_effects();

    wait_for(&runtime, |s| s.adapter_state.is_powered_on()).await;
    runtime.start_scanning().await.unwrap();

    let effect = tokio::time::timeout(Duration::from_secs(1), effects.recv())
        .await
        .expect("no effect")
        .unwrap();
    assert_eq!(effect, Effect::StartScan);

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_connect_to_unknown_device_reports_error() {
    let task = LoopbackTask::new(vec![speaker()]);
    let mut runtime = create_test_runtime(vec![Box::new(task)]).await.unwrap();
    let mut app_events = runtime.take_app_event_receiver().unwrap();

    wait_for(&runtime, |s| s.adapter_state.is_powered_on()).await;
    runtime.connect(DeviceId::new("nope")).await.unwrap();

    let rejected = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(event) = app_events.recv().await {
            if let AppEvent::SessionError {
                error: SessionError::DeviceNotDiscovered { device_id },
            } = event
            {
                return Some(device_id);
            }
        }
        None
    })
    .await
    .expect("no rejection reported");
    assert_eq!(rejected, Some(DeviceId::new("nope")));
    assert!(runtime.snapshot().connection.is_disconnected());

    assert_ok!(runtime.shutdown().await);
}

// ----------------------------------------------------------------------------
// Properties
// ----------------------------------------------------------------------------

proptest! {
    /// Any advertisement sequence leaves each id listed once, in first-seen order
    #[test]
    fn prop_discovered_list_has_unique_ids(ids in prop::collection::vec(0u8..8, 0..64)) {
        let mut manager = SessionManager::default();
        manager.on_adapter_state_changed(PowerState::PoweredOn);
        manager.start_scanning();

        let mut first_seen: Vec<String> = Vec::new();
        for (n, id) in ids.iter().enumerate() {
            let id = format!("dev-{}", id);
            if !first_seen.contains(&id) {
                first_seen.push(id.clone());
            }
            manager.on_device_discovered(Device::new(id.as_str(), Some(format!("adv {}", n))));
        }

        let listed: Vec<String> = manager
            .state()
            .devices()
            .iter()
            .map(|d| d.id.to_string())
            .collect();
        prop_assert_eq!(listed, first_seen);
    }

    /// A disconnect event always clears the slot and stops playback
    #[test]
    fn prop_disconnect_always_clears(connect_first in any::<bool>(), other_id in any::<bool>(), with_error in any::<bool>()) {
        let mut manager = SessionManager::default();
        manager.on_adapter_state_changed(PowerState::PoweredOn);
        manager.on_audio_ready("song.mp3".to_string());
        manager.on_device_discovered(Device::new("A", None));
        if connect_first {
            manager.connect(&DeviceId::new("A"));
            manager.on_connected(Device::new("A", None));
        }

        let id = if other_id { "B" } else { "A" };
        let error = with_error.then(|| "lost".to_string());
        manager.on_disconnected(DeviceId::new(id), error);

        prop_assert!(manager.state().connection.is_disconnected());
        prop_assert!(!manager.state().playing);
    }
}
