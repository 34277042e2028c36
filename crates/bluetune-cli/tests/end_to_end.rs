//! End-to-end tests: CLI application over the simulated radio and a silent engine

use std::time::Duration;

use bluetune_audio::{AudioConfig, AudioTask, SilentEngine};
use bluetune_ble::{demo_peripherals, SimulatedAdapterTask, SimulatorTiming};
use bluetune_cli::{AppConfig, BluetuneApp, CliError};
use bluetune_core::{internal::LogLevel, AppEvent, SessionError, SessionTask};
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(2);

async fn start_app(config: AppConfig) -> BluetuneApp {
    let radio = SimulatedAdapterTask::new(demo_peripherals()).with_timing(SimulatorTiming::fast());
    let simulator = radio.control();
    let audio = AudioTask::new(AudioConfig::default(), SilentEngine::new());
    let tasks: Vec<Box<dyn SessionTask>> = vec![Box::new(radio), Box::new(audio)];

    BluetuneApp::with_tasks(config, tasks, LogLevel::Error, Some(simulator))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_connect_plays_and_link_loss_stops() {
    let app = start_app(AppConfig::default()).await;

    app.wait_for_adapter().await.unwrap();
    app.wait_for(WAIT, "audio", |s| s.is_audio_ready).await.unwrap();

    app.runtime().start_scanning().await.unwrap();
    app.wait_for(WAIT, "discovery", |s| s.find_device("Kitchen Speaker").is_some())
        .await
        .unwrap();

    let speaker = app.resolve_device("Kitchen Speaker").unwrap();
    app.runtime().connect(speaker.id.clone()).await.unwrap();

    let snapshot = app.wait_for(WAIT, "playback", |s| s.is_playing).await.unwrap();
    assert_eq!(snapshot.connected_device().map(|d| &d.id), Some(&speaker.id));
    assert!(!snapshot.is_scanning);

    app.simulator().unwrap().drop_link("out of range").unwrap();
    let snapshot = app
        .wait_for(WAIT, "disconnect", |s| s.connection.is_disconnected())
        .await
        .unwrap();
    assert!(!snapshot.is_playing);
    assert!(matches!(
        snapshot.last_error,
        Some(SessionError::DisconnectedWithError { .. })
    ));

    assert_ok!(app.shutdown().await);
}

#[tokio::test]
async fn test_rejected_connection_is_reported() {
    let mut app = start_app(AppConfig::default()).await;
    let mut events = app.take_app_events().unwrap();

    app.wait_for_adapter().await.unwrap();
    app.runtime().start_scanning().await.unwrap();
    app.wait_for(WAIT, "discovery", |s| s.find_device("Old Tracker").is_some())
        .await
        .unwrap();

    let tracker = app.resolve_device("Old Tracker").unwrap();
    app.runtime().connect(tracker.id).await.unwrap();

    let failure = tokio::time::timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            if let AppEvent::SessionError {
                error: error @ SessionError::ConnectionFailed { .. },
            } = event
            {
                return Some(error);
            }
        }
        None
    })
    .await
    .expect("no connection failure reported");
    assert!(failure.is_some());

    let snapshot = app
        .wait_for(WAIT, "the attempt to settle", |s| s.connection.is_disconnected())
        .await
        .unwrap();
    assert!(!snapshot.is_playing);
    assert!(snapshot.connected_device().is_none());

    assert_ok!(app.shutdown().await);
}

#[tokio::test]
async fn test_auto_play_can_be_disabled() {
    let mut config = AppConfig::default();
    config.session.auto_play_on_connect = false;
    let app = start_app(config).await;

    app.wait_for_adapter().await.unwrap();
    app.wait_for(WAIT, "audio", |s| s.is_audio_ready).await.unwrap();
    app.runtime().start_scanning().await.unwrap();
    app.wait_for(WAIT, "discovery", |s| s.find_device("Headphones").is_some())
        .await
        .unwrap();

    let headphones = app.resolve_device("Headphones").unwrap();
    app.runtime().connect(headphones.id).await.unwrap();
    let snapshot = app
        .wait_for(WAIT, "connection", |s| s.connection.is_connected())
        .await
        .unwrap();
    assert!(!snapshot.is_playing);

    app.runtime().play_audio().await.unwrap();
    app.wait_for(WAIT, "playback", |s| s.is_playing).await.unwrap();

    assert_ok!(app.shutdown().await);
}

#[tokio::test]
async fn test_wait_for_times_out() {
    let app = start_app(AppConfig::default()).await;

    let result = app
        .wait_for(Duration::from_millis(50), "a device", |s| !s.devices.is_empty())
        .await;
    assert!(matches!(result, Err(CliError::Timeout { .. })));
    assert!(matches!(
        app.resolve_device("Kitchen Speaker"),
        Err(CliError::DeviceNotFound { .. })
    ));

    assert_ok!(app.shutdown().await);
}
