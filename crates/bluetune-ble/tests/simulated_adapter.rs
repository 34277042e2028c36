//! Session runtime driven by the simulated adapter

use std::time::Duration;

use bluetune_audio::{AudioConfig, AudioTask, SilentEngine};
use bluetune_ble::{SimulatedAdapterTask, SimulatedPeripheral, SimulatorTiming};
use bluetune_core::{
    internal::{create_effect_channel, create_event_channel},
    AppEvent, ChannelConfig, Device, DeviceId, Effect, Event, PowerState,
    SessionError, SessionSnapshot, SessionTask,
};
use bluetune_runtime::{builder::create_test_runtime, RuntimeHandle};
use tokio_test::assert_ok;
use uuid::Uuid;

fn speaker() -> SimulatedPeripheral {
    SimulatedPeripheral::new(Device::new("SIM-1", Some("Speaker".to_string())).with_rssi(-40))
}

fn simulator(peripherals: Vec<SimulatedPeripheral>) -> SimulatedAdapterTask {
    SimulatedAdapterTask::new(peripherals).with_timing(SimulatorTiming::fast())
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

#[tokio::test]
async fn test_simulated_scan_and_connect() {
    let mut runtime = create_test_runtime(vec![Box::new(simulator(vec![speaker()]))])
        .await
        .unwrap();

    wait_for(&runtime, |s| s.adapter_state.is_powered_on()).await;
    runtime.start_scanning().await.unwrap();
    let snapshot = wait_for(&runtime, |s| !s.devices.is_empty()).await;
    assert_eq!(snapshot.devices[0].display_name(), "Speaker");

    runtime.connect(DeviceId::new("SIM-1")).await.unwrap();
    let snapshot = wait_for(&runtime, |s| s.connection.is_connected()).await;
    assert!(!snapshot.is_scanning);
    // No audio task, so the clip never becomes ready
    assert!(!snapshot.is_playing);

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_repeat_advertisements_do_not_duplicate() {
    let mut runtime = create_test_runtime(vec![Box::new(simulator(vec![speaker()]))])
        .await
        .unwrap();

    wait_for(&runtime, |s| s.adapter_state.is_powered_on()).await;
    runtime.start_scanning().await.unwrap();
    wait_for(&runtime, |s| !s.devices.is_empty()).await;

    // Several advertise intervals
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runtime.snapshot().devices.len(), 1);

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_rejected_connection_is_reported() {
    let peripheral = speaker().rejecting("pairing removed");
    let mut runtime = create_test_runtime(vec![Box::new(simulator(vec![peripheral]))])
        .await
        .unwrap();

    wait_for(&runtime, |s| s.adapter_state.is_powered_on()).await;
    runtime.start_scanning().await.unwrap();
    wait_for(&runtime, |s| !s.devices.is_empty()).await;
    runtime.connect(DeviceId::new("SIM-1")).await.unwrap();

    let snapshot = wait_for(&runtime, |s| s.last_error.is_some()).await;
    assert!(snapshot.connection.is_disconnected());
    assert!(matches!(
        snapshot.last_error,
        Some(SessionError::ConnectionFailed { ref reason, .. }) if reason == "pairing removed"
    ));

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_unresponsive_peripheral_times_out() {
    let peripheral = speaker().unresponsive();
    let mut runtime = create_test_runtime(vec![Box::new(simulator(vec![peripheral]))])
        .await
        .unwrap();

    wait_for(&runtime, |s| s.adapter_state.is_powered_on()).await;
    runtime.start_scanning().await.unwrap();
    wait_for(&runtime, |s| !s.devices.is_empty()).await;
    runtime.connect(DeviceId::new("SIM-1")).await.unwrap();

    let snapshot = wait_for(&runtime, |s| s.last_error.is_some()).await;
    assert!(snapshot.connection.is_disconnected());

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_powered_off_adapter_refuses_scan() {
    let task = simulator(vec![speaker()]).with_power(PowerState::PoweredOff);
    let mut runtime = create_test_runtime(vec![Box::new(task)]).await.unwrap();
    let mut app_events = runtime.take_app_event_receiver().unwrap();

    wait_for(&runtime, |s| s.adapter_state == PowerState::PoweredOff).await;
    runtime.start_scanning().await.unwrap();

    let refused = tokio::time::timeout(Duration::from_secs(1), async {
        while let Some(event) = app_events.recv().await {
            if event
                == (AppEvent::SessionError {
                    error: SessionError::AdapterUnavailable,
                })
            {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(refused);
    assert!(!runtime.snapshot().is_scanning);

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_link_loss_clears_connection() {
    let task = simulator(vec![speaker()]);
    let control = task.control();
    let mut runtime = create_test_runtime(vec![Box::new(task)]).await.unwrap();

    wait_for(&runtime, |s| s.adapter_state.is_powered_on()).await;
    runtime.start_scanning().await.unwrap();
    wait_for(&runtime, |s| !s.devices.is_empty()).await;
    runtime.connect(DeviceId::new("SIM-1")).await.unwrap();
    wait_for(&runtime, |s| s.connection.is_connected()).await;

    control.drop_link("out of range").unwrap();
    let snapshot = wait_for(&runtime, |s| s.connection.is_disconnected()).await;
    assert!(matches!(
        snapshot.last_error,
        Some(SessionError::DisconnectedWithError { .. })
    ));

    assert_ok!(runtime.shutdown().await);
}

#[tokio::test]
async fn test_gatt_table_reported_after_connect() {
    let config = ChannelConfig::testing();
    let (event_sender, mut event_receiver) = create_event_channel(&config);
    let (effect_sender, effect_receiver) = create_effect_channel(&config);

    let battery = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);
    let level = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
    let peripheral = speaker().with_services(vec![(battery, vec![level])]);

    let mut task = simulator(vec![peripheral]);
    task.attach_channels(event_sender, effect_receiver).unwrap();
    let handle = tokio::spawn(async move { task.run().await });

    effect_sender
        .send(Effect::Connect {
            device_id: DeviceId::new("SIM-1"),
        })
        .unwrap();

    let mut seen = Vec::new();
    while seen.len() < 4 {
        let event = tokio::time::timeout(Duration::from_secs(1), event_receiver.recv())
            .await
            .expect("simulator stalled")
            .expect("event channel closed");
        seen.push(event);
    }

    assert!(matches!(seen[0], Event::AdapterStateChanged { .. }));
    assert!(matches!(seen[1], Event::Connected { .. }));
    match &seen[2] {
        Event::ServicesDiscovered { services, error, .. } => {
            assert_eq!(services, &vec![battery]);
            assert!(error.is_none());
        }
        other => panic!("expected services, got {:?}", other),
    }
    match &seen[3] {
        Event::CharacteristicsDiscovered {
            service,
            characteristics,
            ..
        } => {
            assert_eq!(*service, battery);
            assert_eq!(characteristics, &vec![level]);
        }
        other => panic!("expected characteristics, got {:?}", other),
    }

    drop(effect_sender);
    assert_ok!(handle.await.unwrap());
}

#[tokio::test]
async fn test_power_loss_mid_connection_stops_everything() {
    let radio = simulator(vec![speaker()]);
    let control = radio.control();
    let audio = AudioTask::new(AudioConfig::default(), SilentEngine::new());
    let mut runtime = create_test_runtime(vec![Box::new(radio), Box::new(audio)])
        .await
        .unwrap();

    wait_for(&runtime, |s| s.adapter_state.is_powered_on() && s.is_audio_ready).await;
    runtime.start_scanning().await.unwrap();
    wait_for(&runtime, |s| !s.devices.is_empty()).await;
    runtime.connect(DeviceId::new("SIM-1")).await.unwrap();
    wait_for(&runtime, |s| s.is_playing).await;

    // Look for other devices while the link is up
    runtime.start_scanning().await.unwrap();
    wait_for(&runtime, |s| s.is_scanning).await;

    control.set_power(PowerState::PoweredOff).unwrap();
    let snapshot = wait_for(&runtime, |s| {
        s.adapter_state == PowerState::PoweredOff && s.connection.is_disconnected()
    })
    .await;
    assert!(!snapshot.is_playing);
    assert!(!snapshot.is_scanning);
    assert!(matches!(
        snapshot.last_error,
        Some(SessionError::DisconnectedWithError { ref reason, .. }) if reason == "adapter is PoweredOff"
    ));

    assert_ok!(runtime.shutdown().await);
}
