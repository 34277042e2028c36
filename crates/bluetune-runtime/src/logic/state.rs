//! Session State Management
//!
//! Contains the session state owned by the logic task, statistics, and the
//! logger wrapper.

use std::collections::HashSet;

use bluetune_core::internal::{
    LogLevel, NoOpLogger, TaskId, TaskLogger, TracingLogger,
};
use bluetune_core::{
    AppEvent, Command, ConnectionState, Device, DeviceId, Effect, Event, PowerState,
    SessionConfig, SessionError, SessionSnapshot,
};

// ----------------------------------------------------------------------------
// Audio Readiness
// ----------------------------------------------------------------------------

/// Lifecycle of the playback resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioReadiness {
    #[default]
    Loading,
    Ready,
    /// Terminal for the lifetime of the process
    Failed,
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// Session state owned by the logic task
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Policy knobs
    pub config: SessionConfig,
    /// Discovered devices in first-seen order
    devices: Vec<Device>,
    /// Ids present in `devices`
    known_ids: HashSet<DeviceId>,
    /// The single connection slot
    pub connection: ConnectionState,
    pub scanning: bool,
    pub playing: bool,
    /// Number of the most recent play request
    pub playback: u64,
    /// Unrequested links the session asked the adapter to drop
    rejected: HashSet<DeviceId>,
    pub audio: AudioReadiness,
    /// Last power state reported by the adapter
    pub adapter_state: PowerState,
    pub last_error: Option<SessionError>,
    pub stats: SessionStats,
}

impl SessionState {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        if !self.known_ids.contains(id) {
            return None;
        }
        self.devices.iter().find(|d| &d.id == id)
    }

    /// Append a device unless its id is already present
    ///
    /// Returns `true` when the device was new.
    pub fn insert_device(&mut self, device: Device) -> bool {
        if !self.known_ids.insert(device.id.clone()) {
            return false;
        }
        self.devices.push(device);
        true
    }

    /// Forget all discovered devices; returns `true` if any were removed
    pub fn clear_devices(&mut self) -> bool {
        let had_devices = !self.devices.is_empty();
        self.devices.clear();
        self.known_ids.clear();
        had_devices
    }

    /// Remember a link the session refused
    pub fn reject_link(&mut self, id: DeviceId) {
        self.rejected.insert(id);
    }

    /// Forget a refused link; `true` if it was one
    pub fn take_rejected(&mut self, id: &DeviceId) -> bool {
        self.rejected.remove(id)
    }

    /// Start numbering a new play request
    pub fn next_playback(&mut self) -> u64 {
        self.playback += 1;
        self.playback
    }

    pub fn is_audio_ready(&self) -> bool {
        self.audio == AudioReadiness::Ready
    }

    /// Record a failure for the snapshot
    pub fn record_error(&mut self, error: SessionError) {
        self.stats.errors_recorded += 1;
        self.last_error = Some(error);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            devices: self.devices.clone(),
            connection: self.connection.clone(),
            is_scanning: self.scanning,
            is_playing: self.playing,
            is_audio_ready: self.is_audio_ready(),
            adapter_state: self.adapter_state,
            last_error: self.last_error.clone(),
        }
    }
}

/// Statistics for the session logic task
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub commands_processed: u64,
    pub events_processed: u64,
    pub effects_generated: u64,
    pub app_events_generated: u64,
    pub state_transitions: u64,
    pub errors_recorded: u64,
}

// ----------------------------------------------------------------------------
// Logger Wrapper
// ----------------------------------------------------------------------------

/// Logger wrapper for object safety
#[derive(Debug, Clone)]
pub enum LoggerWrapper {
    Tracing(TracingLogger),
    NoOp(NoOpLogger),
}

impl LoggerWrapper {
    pub fn log_receive_command(&self, message: &Command) {
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_receive(TaskId::Presentation, TaskId::SessionManager, message, None)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_receive(TaskId::Presentation, TaskId::SessionManager, message, None)
            }
        }
    }

    pub fn log_receive_event(&self, message: &Event) {
        let from = TaskId::Capability(message.source());
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_receive(from, TaskId::SessionManager, message, None)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_receive(from, TaskId::SessionManager, message, None)
            }
        }
    }

    pub fn log_send_effect(&self, message: &Effect) {
        let to = TaskId::Capability(message.target());
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_send(TaskId::SessionManager, to, message, None)
            }
            LoggerWrapper::NoOp(logger) => logger.log_send(TaskId::SessionManager, to, message, None),
        }
    }

    pub fn log_send_app_event(&self, message: &AppEvent, channel_utilization: Option<f32>) {
        match self {
            LoggerWrapper::Tracing(logger) => logger.log_send(
                TaskId::SessionManager,
                TaskId::Presentation,
                message,
                channel_utilization,
            ),
            LoggerWrapper::NoOp(logger) => logger.log_send(
                TaskId::SessionManager,
                TaskId::Presentation,
                message,
                channel_utilization,
            ),
        }
    }

    pub fn log_drop_app_event(&self, message: &AppEvent, reason: &str) {
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_drop(TaskId::SessionManager, TaskId::Presentation, message, reason)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_drop(TaskId::SessionManager, TaskId::Presentation, message, reason)
            }
        }
    }

    pub fn log_task_event(&self, level: LogLevel, message: &str) {
        match self {
            LoggerWrapper::Tracing(logger) => {
                logger.log_task_event(TaskId::SessionManager, level, message)
            }
            LoggerWrapper::NoOp(logger) => {
                logger.log_task_event(TaskId::SessionManager, level, message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_device_first_occurrence_wins() {
        let mut state = SessionState::default();
        assert!(state.insert_device(Device::new("A", Some("first".to_string()))));
        assert!(!state.insert_device(Device::new("A", Some("second".to_string()))));
        assert_eq!(state.devices().len(), 1);
        assert_eq!(state.devices()[0].name.as_deref(), Some("first"));
    }

    #[test]
    fn test_clear_devices_resets_index() {
        let mut state = SessionState::default();
        state.insert_device(Device::new("A", None));
        assert!(state.clear_devices());
        assert!(!state.clear_devices());
        assert!(state.device(&DeviceId::new("A")).is_none());
        assert!(state.insert_device(Device::new("A", None)));
    }

    #[test]
    fn test_snapshot_mirrors_state() {
        let mut state = SessionState::default();
        state.insert_device(Device::new("A", None));
        state.scanning = true;
        state.audio = AudioReadiness::Ready;

        let snapshot = state.snapshot();
        assert_eq!(snapshot.devices.len(), 1);
        assert!(snapshot.is_scanning);
        assert!(snapshot.is_audio_ready);
        assert!(!snapshot.is_playing);
        assert!(snapshot.connected_device().is_none());
    }
}
