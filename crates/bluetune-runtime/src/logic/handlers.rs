//! Session Manager Operations and Event Handlers
//!
//! `SessionManager` owns the `SessionState` and turns user intents and adapter or
//! engine events into state changes. It never performs I/O itself: every side
//! effect is returned as an `Effect` and every visible change as an `AppEvent`.

use bluetune_core::{
    AppEvent, Command, ConnectionState, Device, DeviceId, Effect, Event, PowerState,
    SessionConfig, SessionError, SessionSnapshot,
};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::state::{AudioReadiness, SessionState};

// ----------------------------------------------------------------------------
// Outcome
// ----------------------------------------------------------------------------

/// Effects and app events produced by one operation
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outcome {
    pub effects: Vec<Effect>,
    pub app_events: Vec<AppEvent>,
}

impl Outcome {
    fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    fn notify(&mut self, app_event: AppEvent) {
        self.app_events.push(app_event);
    }

    fn merge(&mut self, other: Outcome) {
        self.effects.extend(other.effects);
        self.app_events.extend(other.app_events);
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.app_events.is_empty()
    }
}

// ----------------------------------------------------------------------------
// Session Manager
// ----------------------------------------------------------------------------

/// Policy layer between user intent, the Bluetooth adapter and the audio engine
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    state: SessionState,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            state: SessionState::new(config),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.snapshot()
    }

    /// Dispatch a user intent
    ///
    /// `Command::Shutdown` produces nothing here; the logic task owns its loop.
    pub fn handle_command(&mut self, command: &Command) -> Outcome {
        self.state.stats.commands_processed += 1;
        match command {
            Command::StartScanning => self.start_scanning(),
            Command::StopScanning => self.stop_scanning(),
            Command::Connect { device_id } => self.connect(device_id),
            Command::Disconnect => self.disconnect(),
            Command::PlayAudio => self.play_audio_on_connected_device(),
            Command::StopAudio => self.stop_playback(),
            Command::GetSnapshot => {
                let mut out = Outcome::default();
                out.notify(AppEvent::Snapshot {
                    snapshot: self.snapshot(),
                });
                out
            }
            Command::Shutdown => Outcome::default(),
        }
    }

    /// Dispatch an adapter or engine event
    pub fn handle_event(&mut self, event: Event) -> Outcome {
        self.state.stats.events_processed += 1;
        match event {
            Event::AdapterStateChanged { state } => self.on_adapter_state_changed(state),
            Event::DeviceDiscovered { device } => self.on_device_discovered(device),
            Event::Connected { device } => self.on_connected(device),
            Event::ConnectionFailed { device_id, reason } => {
                self.on_connection_failed(device_id, reason)
            }
            Event::Disconnected { device_id, error } => self.on_disconnected(device_id, error),
            Event::ServicesDiscovered {
                device_id,
                services,
                error,
            } => self.on_services_discovered(device_id, services, error),
            Event::CharacteristicsDiscovered {
                device_id,
                service,
                characteristics,
                error,
            } => self.on_characteristics_discovered(device_id, service, characteristics, error),
            Event::ScanFailed { reason } => self.on_scan_failed(reason),
            Event::AdapterError { reason } => self.on_adapter_error(reason),
            Event::AudioReady { clip } => self.on_audio_ready(clip),
            Event::AudioLoadFailed { reason } => self.on_audio_load_failed(reason),
            Event::PlaybackFinished { playback } => self.on_playback_finished(playback),
            Event::PlaybackFailed { reason } => self.on_playback_failed(reason),
        }
    }

    // ------------------------------------------------------------------------
    // User Intents
    // ------------------------------------------------------------------------

    /// Begin discovery; refused unless the adapter is powered on
    pub fn start_scanning(&mut self) -> Outcome {
        let mut out = Outcome::default();

        if !self.state.adapter_state.is_powered_on() {
            debug!(
                "Scan request ignored: adapter is {}",
                self.state.adapter_state
            );
            out.notify(AppEvent::SessionError {
                error: SessionError::AdapterUnavailable,
            });
            return out;
        }

        if self.state.config.clear_devices_on_scan && self.state.clear_devices() {
            out.notify(AppEvent::DeviceListCleared);
        }

        out.effect(Effect::StartScan);
        self.set_scanning(true, &mut out);
        out
    }

    /// Halt discovery; idempotent
    pub fn stop_scanning(&mut self) -> Outcome {
        let mut out = Outcome::default();
        out.effect(Effect::StopScan);
        self.set_scanning(false, &mut out);
        out
    }

    /// Request a connection to a discovered device
    ///
    /// Only accepted from `Disconnected`; a second connect while one is pending
    /// or live is rejected rather than superseding it.
    pub fn connect(&mut self, device_id: &DeviceId) -> Outcome {
        let mut out = Outcome::default();

        let Some(device) = self.state.device(device_id).cloned() else {
            warn!("Connect to undiscovered device {} rejected", device_id);
            out.notify(AppEvent::SessionError {
                error: SessionError::DeviceNotDiscovered {
                    device_id: device_id.clone(),
                },
            });
            return out;
        };

        if !self.state.connection.is_disconnected() {
            let current = self.state.connection.status();
            warn!("Connect to {} rejected: session is {}", device, current);
            out.notify(AppEvent::SessionError {
                error: SessionError::ConnectRejected {
                    device_id: device_id.clone(),
                    current,
                },
            });
            return out;
        }

        info!("Connecting to {}", device);
        self.transition(ConnectionState::Connecting(device), &mut out);
        out.effect(Effect::Connect {
            device_id: device_id.clone(),
        });
        out
    }

    /// Request teardown of the pending or live connection
    pub fn disconnect(&mut self) -> Outcome {
        let mut out = Outcome::default();

        let Some(device) = self.state.connection.device().cloned() else {
            debug!("Disconnect ignored: no connection");
            return out;
        };

        info!("Disconnecting from {}", device);
        let device_id = device.id.clone();
        self.transition(ConnectionState::Disconnecting(device), &mut out);
        out.effect(Effect::Disconnect { device_id });
        out
    }

    /// Start playback if the clip is ready, idle, and a device is connected
    pub fn play_audio_on_connected_device(&mut self) -> Outcome {
        let mut out = Outcome::default();

        if !self.state.is_audio_ready()
            || self.state.playing
            || !self.state.connection.is_connected()
        {
            debug!(
                "Play refused: ready={} playing={} connection={}",
                self.state.is_audio_ready(),
                self.state.playing,
                self.state.connection.status()
            );
            return out;
        }

        self.state.playing = true;
        let playback = self.state.next_playback();
        out.effect(Effect::PlayAudio { playback });
        out.notify(AppEvent::PlaybackChanged { playing: true });
        out
    }

    /// Stop playback and rewind; no-op when idle
    pub fn stop_playback(&mut self) -> Outcome {
        let mut out = Outcome::default();

        if !self.state.playing {
            return out;
        }

        self.state.playing = false;
        out.effect(Effect::StopAudio);
        out.notify(AppEvent::PlaybackChanged { playing: false });
        out
    }

    // ------------------------------------------------------------------------
    // Adapter Events
    // ------------------------------------------------------------------------

    pub fn on_adapter_state_changed(&mut self, state: PowerState) -> Outcome {
        let mut out = Outcome::default();

        if state.is_powered_on() {
            info!("Bluetooth is powered on");
        } else {
            warn!("Bluetooth is not available: {}", state);
        }

        if self.state.adapter_state != state {
            self.state.adapter_state = state;
            out.notify(AppEvent::AdapterStateChanged { state });
        }
        // A radio that went away is no longer discovering
        if !state.is_powered_on() {
            self.set_scanning(false, &mut out);
        }
        out
    }

    /// Append a device the first time its id is seen
    pub fn on_device_discovered(&mut self, device: Device) -> Outcome {
        let mut out = Outcome::default();

        if self.state.insert_device(device.clone()) {
            debug!("Discovered {}", device);
            out.notify(AppEvent::DeviceDiscovered { device });
        } else {
            trace!("Ignoring repeat advertisement from {}", device.id);
        }
        out
    }

    /// Connection came up: record it, end scanning, start playback
    pub fn on_connected(&mut self, device: Device) -> Outcome {
        let mut out = Outcome::default();

        let pending = match &self.state.connection {
            ConnectionState::Connecting(pending) if pending.id == device.id => pending.clone(),
            ConnectionState::Disconnecting(pending) if pending.id == device.id => {
                debug!("{} connected while a disconnect is pending", device);
                return out;
            }
            ConnectionState::Connected(current) if current.id == device.id => {
                debug!("Duplicate connected event for {}", device);
                return out;
            }
            other => {
                warn!(
                    "Unrequested connection to {} while session is {}; dropping it",
                    device,
                    other.status()
                );
                self.state.reject_link(device.id.clone());
                out.effect(Effect::Disconnect {
                    device_id: device.id,
                });
                return out;
            }
        };

        let device = Device {
            name: device.name.or(pending.name),
            rssi: device.rssi.or(pending.rssi),
            id: device.id,
        };

        info!("Connected to {}", device.display_name());
        self.transition(ConnectionState::Connected(device), &mut out);

        out.merge(self.stop_scanning());
        if self.state.config.auto_play_on_connect {
            out.merge(self.play_audio_on_connected_device());
        }
        out
    }

    pub fn on_connection_failed(&mut self, device_id: DeviceId, reason: String) -> Outcome {
        let mut out = Outcome::default();

        match &self.state.connection {
            ConnectionState::Connecting(pending) | ConnectionState::Disconnecting(pending)
                if pending.id == device_id =>
            {
                error!("Failed to connect to {}: {}", pending, reason);
                self.transition(ConnectionState::Disconnected, &mut out);
                self.fail(
                    SessionError::ConnectionFailed { device_id, reason },
                    &mut out,
                );
            }
            other => {
                warn!(
                    "Stale connection failure for {} while session is {}: {}",
                    device_id,
                    other.status(),
                    reason
                );
            }
        }
        out
    }

    /// Link is gone: clear the single connection slot and stop playback
    ///
    /// The slot is cleared whichever device the event names. Only one
    /// connection exists at a time, so there is nothing else it could refer to.
    /// The one exception is the teardown of a link `on_connected` refused,
    /// which never occupied the slot.
    pub fn on_disconnected(&mut self, device_id: DeviceId, error: Option<String>) -> Outcome {
        let mut out = Outcome::default();

        let tracked = self.state.connection.device().map(|d| d.id.clone());
        if self.state.take_rejected(&device_id) && tracked.as_ref() != Some(&device_id) {
            debug!("Refused link to {} closed", device_id);
            return out;
        }

        match self.state.connection.device() {
            Some(tracked) if tracked.id != device_id => {
                debug!(
                    "Disconnect event names {} but session tracks {}; clearing anyway",
                    device_id, tracked.id
                );
            }
            _ => {}
        }

        let name = self
            .state
            .connection
            .device()
            .map(|d| d.display_name().to_string())
            .unwrap_or_else(|| "unknown device".to_string());
        info!("Disconnected from {}", name);

        self.transition(ConnectionState::Disconnected, &mut out);

        if let Some(reason) = error {
            warn!("Disconnect from {} reported: {}", device_id, reason);
            self.fail(
                SessionError::DisconnectedWithError { device_id, reason },
                &mut out,
            );
        }

        if self.state.config.auto_stop_on_disconnect {
            out.merge(self.stop_playback());
        }
        out
    }

    pub fn on_services_discovered(
        &mut self,
        device_id: DeviceId,
        services: Vec<Uuid>,
        error: Option<String>,
    ) -> Outcome {
        let mut out = Outcome::default();

        if let Some(reason) = error {
            error!("Error discovering services on {}: {}", device_id, reason);
            self.fail(SessionError::DiscoveryError { device_id, reason }, &mut out);
            return out;
        }

        for service in &services {
            info!("Discovered service: {}", service);
        }
        out.notify(AppEvent::ServicesDiscovered {
            device_id,
            services,
        });
        out
    }

    pub fn on_characteristics_discovered(
        &mut self,
        device_id: DeviceId,
        service: Uuid,
        characteristics: Vec<Uuid>,
        error: Option<String>,
    ) -> Outcome {
        let mut out = Outcome::default();

        if let Some(reason) = error {
            error!(
                "Error discovering characteristics of {} on {}: {}",
                service, device_id, reason
            );
            self.fail(SessionError::DiscoveryError { device_id, reason }, &mut out);
            return out;
        }

        debug!(
            "Service {} on {} has {} characteristics",
            service,
            device_id,
            characteristics.len()
        );
        for characteristic in &characteristics {
            info!("Discovered characteristic: {}", characteristic);
        }
        out.notify(AppEvent::CharacteristicsDiscovered {
            device_id,
            service,
            characteristics,
        });
        out
    }

    pub fn on_scan_failed(&mut self, reason: String) -> Outcome {
        let mut out = Outcome::default();
        error!("Scan failed: {}", reason);
        self.set_scanning(false, &mut out);
        self.fail(SessionError::ScanFailed { reason }, &mut out);
        out
    }

    pub fn on_adapter_error(&mut self, reason: String) -> Outcome {
        let mut out = Outcome::default();
        error!("Adapter error: {}", reason);
        self.fail(SessionError::AdapterError { reason }, &mut out);
        out
    }

    // ------------------------------------------------------------------------
    // Audio Events
    // ------------------------------------------------------------------------

    pub fn on_audio_ready(&mut self, clip: String) -> Outcome {
        let mut out = Outcome::default();

        if self.state.audio != AudioReadiness::Loading {
            warn!("Ignoring late readiness report for {}", clip);
            return out;
        }

        info!("Audio clip {} ready", clip);
        self.state.audio = AudioReadiness::Ready;
        out.notify(AppEvent::AudioReadinessChanged { ready: true });
        out
    }

    /// Load failure is permanent for the life of the session
    pub fn on_audio_load_failed(&mut self, reason: String) -> Outcome {
        let mut out = Outcome::default();

        if self.state.audio != AudioReadiness::Loading {
            warn!("Ignoring late load failure: {}", reason);
            return out;
        }

        error!("Error loading audio file: {}", reason);
        self.state.audio = AudioReadiness::Failed;
        self.fail(SessionError::AudioLoadFailure { reason }, &mut out);
        out
    }

    /// Only the finish of the latest play request clears the flag
    pub fn on_playback_finished(&mut self, playback: u64) -> Outcome {
        let mut out = Outcome::default();
        if playback != self.state.playback {
            debug!(
                "Ignoring finish of play {}, current is {}",
                playback, self.state.playback
            );
            return out;
        }
        if self.state.playing {
            debug!("Playback reached end of clip");
            self.state.playing = false;
            out.notify(AppEvent::PlaybackChanged { playing: false });
        }
        out
    }

    pub fn on_playback_failed(&mut self, reason: String) -> Outcome {
        let mut out = Outcome::default();
        error!("Playback failed: {}", reason);
        if self.state.playing {
            self.state.playing = false;
            out.notify(AppEvent::PlaybackChanged { playing: false });
        }
        self.fail(SessionError::PlaybackFailed { reason }, &mut out);
        out
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn set_scanning(&mut self, active: bool, out: &mut Outcome) {
        if self.state.scanning != active {
            self.state.scanning = active;
            out.notify(AppEvent::ScanningChanged { active });
        }
    }

    fn transition(&mut self, next: ConnectionState, out: &mut Outcome) {
        if self.state.connection == next {
            return;
        }
        self.state.stats.state_transitions += 1;
        out.notify(AppEvent::ConnectionChanged {
            status: next.status(),
            device: next.device().cloned(),
        });
        self.state.connection = next;
    }

    fn fail(&mut self, error: SessionError, out: &mut Outcome) {
        self.state.record_error(error.clone());
        out.notify(AppEvent::SessionError { error });
    }
}
