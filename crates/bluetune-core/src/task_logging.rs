//! Task Communication Logging Infrastructure
//!
//! Structured logging of CSP channel traffic for debugging. Every message that
//! crosses a channel can be summarized into one `tracing` record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::{AppEvent, Command, Effect, Event, TaskKind};

// ----------------------------------------------------------------------------
// Log Event Types
// ----------------------------------------------------------------------------

/// Log levels for task communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warn => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// Task identifiers for communication logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskId {
    SessionManager,
    Capability(TaskKind),
    Presentation,
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::SessionManager => write!(f, "SessionManager"),
            TaskId::Capability(kind) => write!(f, "Capability({})", kind),
            TaskId::Presentation => write!(f, "Presentation"),
        }
    }
}

/// Communication direction for channel messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Send,
    Receive,
    Drop,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => write!(f, "→"),
            Direction::Receive => write!(f, "←"),
            Direction::Drop => write!(f, "✗"),
        }
    }
}

/// Message type classification for logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    Command(String),
    Event(String),
    Effect(String),
    AppEvent(String),
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Command(cmd) => write!(f, "Command::{}", cmd),
            MessageType::Event(event) => write!(f, "Event::{}", event),
            MessageType::Effect(effect) => write!(f, "Effect::{}", effect),
            MessageType::AppEvent(app_event) => write!(f, "AppEvent::{}", app_event),
        }
    }
}

// ----------------------------------------------------------------------------
// Message Type Extraction
// ----------------------------------------------------------------------------

impl From<&Command> for MessageType {
    fn from(command: &Command) -> Self {
        let variant = match command {
            Command::StartScanning => "StartScanning",
            Command::StopScanning => "StopScanning",
            Command::Connect { .. } => "Connect",
            Command::Disconnect => "Disconnect",
            Command::PlayAudio => "PlayAudio",
            Command::StopAudio => "StopAudio",
            Command::GetSnapshot => "GetSnapshot",
            Command::Shutdown => "Shutdown",
        };
        MessageType::Command(variant.to_string())
    }
}

impl From<&Event> for MessageType {
    fn from(event: &Event) -> Self {
        let variant = match event {
            Event::AdapterStateChanged { .. } => "AdapterStateChanged",
            Event::DeviceDiscovered { .. } => "DeviceDiscovered",
            Event::Connected { .. } => "Connected",
            Event::ConnectionFailed { .. } => "ConnectionFailed",
            Event::Disconnected { .. } => "Disconnected",
            Event::ServicesDiscovered { .. } => "ServicesDiscovered",
            Event::CharacteristicsDiscovered { .. } => "CharacteristicsDiscovered",
            Event::ScanFailed { .. } => "ScanFailed",
            Event::AdapterError { .. } => "AdapterError",
            Event::AudioReady { .. } => "AudioReady",
            Event::AudioLoadFailed { .. } => "AudioLoadFailed",
            Event::PlaybackFinished { .. } => "PlaybackFinished",
            Event::PlaybackFailed { .. } => "PlaybackFailed",
        };
        MessageType::Event(variant.to_string())
    }
}

impl From<&Effect> for MessageType {
    fn from(effect: &Effect) -> Self {
        let variant = match effect {
            Effect::StartScan => "StartScan",
            Effect::StopScan => "StopScan",
            Effect::Connect { .. } => "Connect",
            Effect::Disconnect { .. } => "Disconnect",
            Effect::PlayAudio { .. } => "PlayAudio",
            Effect::StopAudio => "StopAudio",
        };
        MessageType::Effect(variant.to_string())
    }
}

impl From<&AppEvent> for MessageType {
    fn from(app_event: &AppEvent) -> Self {
        let variant = match app_event {
            AppEvent::AdapterStateChanged { .. } => "AdapterStateChanged",
            AppEvent::ScanningChanged { .. } => "ScanningChanged",
            AppEvent::DeviceListCleared => "DeviceListCleared",
            AppEvent::DeviceDiscovered { .. } => "DeviceDiscovered",
            AppEvent::ConnectionChanged { .. } => "ConnectionChanged",
            AppEvent::PlaybackChanged { .. } => "PlaybackChanged",
            AppEvent::AudioReadinessChanged { .. } => "AudioReadinessChanged",
            AppEvent::ServicesDiscovered { .. } => "ServicesDiscovered",
            AppEvent::CharacteristicsDiscovered { .. } => "CharacteristicsDiscovered",
            AppEvent::SessionError { .. } => "SessionError",
            AppEvent::Snapshot { .. } => "Snapshot",
        };
        MessageType::AppEvent(variant.to_string())
    }
}

// ----------------------------------------------------------------------------
// Message Summary Generation
// ----------------------------------------------------------------------------

pub trait MessageSummary {
    fn summary(&self) -> String;
}

impl MessageSummary for Command {
    fn summary(&self) -> String {
        match self {
            Command::Connect { device_id } => format!("device:{}", device_id),
            Command::StartScanning => "starting scan".to_string(),
            Command::StopScanning => "stopping scan".to_string(),
            Command::Disconnect => "disconnecting".to_string(),
            Command::PlayAudio => "play".to_string(),
            Command::StopAudio => "stop".to_string(),
            Command::GetSnapshot => "requesting snapshot".to_string(),
            Command::Shutdown => "shutting down".to_string(),
        }
    }
}

impl MessageSummary for Event {
    fn summary(&self) -> String {
        match self {
            Event::AdapterStateChanged { state } => format!("state:{}", state),
            Event::DeviceDiscovered { device } => {
                format!("device:{} rssi:{:?}", device, device.rssi)
            }
            Event::Connected { device } => format!("device:{}", device),
            Event::ConnectionFailed { device_id, reason } => {
                format!("device:{} reason:{}", device_id, reason)
            }
            Event::Disconnected { device_id, error } => {
                format!("device:{} error:{:?}", device_id, error)
            }
            Event::ServicesDiscovered {
                device_id,
                services,
                error,
            } => format!(
                "device:{} services:{} error:{:?}",
                device_id,
                services.len(),
                error
            ),
            Event::CharacteristicsDiscovered {
                device_id,
                service,
                characteristics,
                ..
            } => format!(
                "device:{} service:{} characteristics:{}",
                device_id,
                service,
                characteristics.len()
            ),
            Event::ScanFailed { reason } | Event::AdapterError { reason } => {
                format!("reason:{}", reason)
            }
            Event::AudioReady { clip } => format!("clip:{}", clip),
            Event::AudioLoadFailed { reason } | Event::PlaybackFailed { reason } => {
                format!("reason:{}", reason)
            }
            Event::PlaybackFinished { playback } => format!("end of clip, play:{}", playback),
        }
    }
}

impl MessageSummary for Effect {
    fn summary(&self) -> String {
        match self {
            Effect::Connect { device_id } | Effect::Disconnect { device_id } => {
                format!("device:{} via:{}", device_id, self.target())
            }
            Effect::PlayAudio { playback } => format!("play:{} via:{}", playback, self.target()),
            _ => format!("via:{}", self.target()),
        }
    }
}

impl MessageSummary for AppEvent {
    fn summary(&self) -> String {
        match self {
            AppEvent::AdapterStateChanged { state } => format!("state:{}", state),
            AppEvent::ScanningChanged { active } => format!("active:{}", active),
            AppEvent::DeviceListCleared => "cleared".to_string(),
            AppEvent::DeviceDiscovered { device } => format!("device:{}", device),
            AppEvent::ConnectionChanged { status, device } => format!(
                "status:{} device:{}",
                status,
                device.as_ref().map(|d| d.id.to_string()).unwrap_or_default()
            ),
            AppEvent::PlaybackChanged { playing } => format!("playing:{}", playing),
            AppEvent::AudioReadinessChanged { ready } => format!("ready:{}", ready),
            AppEvent::ServicesDiscovered {
                device_id,
                services,
            } => format!("device:{} services:{}", device_id, services.len()),
            AppEvent::CharacteristicsDiscovered {
                device_id,
                service,
                characteristics,
            } => format!(
                "device:{} service:{} characteristics:{}",
                device_id,
                service,
                characteristics.len()
            ),
            AppEvent::SessionError { error } => format!("error:{}", error),
            AppEvent::Snapshot { snapshot } => format!(
                "devices:{} connection:{} scanning:{} playing:{}",
                snapshot.devices.len(),
                snapshot.connection.status(),
                snapshot.is_scanning,
                snapshot.is_playing
            ),
        }
    }
}

// ----------------------------------------------------------------------------
// Logger Implementation
// ----------------------------------------------------------------------------

/// Task communication logger
pub trait TaskLogger {
    fn log_send<T>(&self, from: TaskId, to: TaskId, message: &T, channel_utilization: Option<f32>)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_receive<T>(
        &self,
        from: TaskId,
        to: TaskId,
        message: &T,
        channel_utilization: Option<f32>,
    ) where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_drop<T>(&self, from: TaskId, to: TaskId, message: &T, reason: &str)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary;

    fn log_task_event(&self, task: TaskId, level: LogLevel, message: &str);
}

/// Logger that forwards channel traffic to `tracing`
#[derive(Debug, Clone)]
pub struct TracingLogger {
    min_level: LogLevel,
}

impl TracingLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    fn format_utilization(channel_utilization: Option<f32>) -> String {
        channel_utilization
            .map(|u| format!(" util:{:.1}%", u * 100.0))
            .unwrap_or_default()
    }
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self::new(LogLevel::Debug)
    }
}

impl TaskLogger for TracingLogger {
    fn log_send<T>(&self, from: TaskId, to: TaskId, message: &T, channel_utilization: Option<f32>)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Debug) {
            return;
        }
        let message_type: MessageType = message.into();
        tracing::debug!(
            "{} {} {} {} {}{}",
            from,
            Direction::Send,
            to,
            message_type,
            message.summary(),
            Self::format_utilization(channel_utilization)
        );
    }

    fn log_receive<T>(
        &self,
        from: TaskId,
        to: TaskId,
        message: &T,
        channel_utilization: Option<f32>,
    ) where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Debug) {
            return;
        }
        let message_type: MessageType = message.into();
        tracing::debug!(
            "{} {} {} {} {}{}",
            to,
            Direction::Receive,
            from,
            message_type,
            message.summary(),
            Self::format_utilization(channel_utilization)
        );
    }

    fn log_drop<T>(&self, from: TaskId, to: TaskId, message: &T, reason: &str)
    where
        for<'a> &'a T: Into<MessageType>,
        T: MessageSummary,
    {
        if !self.should_log(LogLevel::Warn) {
            return;
        }
        let message_type: MessageType = message.into();
        tracing::warn!(
            "{} {} {} {} {} reason:{}",
            from,
            Direction::Drop,
            to,
            message_type,
            message.summary(),
            reason
        );
    }

    fn log_task_event(&self, task: TaskId, level: LogLevel, message: &str) {
        if !self.should_log(level) {
            return;
        }
        match level {
            LogLevel::Trace => tracing::trace!("{} {}", task, message),
            LogLevel::Debug => tracing::debug!("{} {}", task, message),
            LogLevel::Info => tracing::info!("{} {}", task, message),
            LogLevel::Warn => tracing::warn!("{} {}", task, message),
            LogLevel::Error => tracing::error!("{} {}", task, message),
        }
    }
}

/// No-op logger for when channel logging is disabled
#[derive(Debug, Clone)]
pub struct NoOpLogger;

impl TaskLogger for NoOpLogger {
    fn log_send<T>(&self, _from: TaskId, _to: TaskId, _message: &T, _channel_utilization: Option<f32>) {}

    fn log_receive<T>(
        &self,
        _from: TaskId,
        _to: TaskId,
        _message: &T,
        _channel_utilization: Option<f32>,
    ) {
    }

    fn log_drop<T>(&self, _from: TaskId, _to: TaskId, _message: &T, _reason: &str) {}

    fn log_task_event(&self, _task: TaskId, _level: LogLevel, _message: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Device, DeviceId};

    #[test]
    fn test_message_type_conversion() {
        let command = Command::StartScanning;
        let msg_type = MessageType::from(&command);
        assert_eq!(msg_type, MessageType::Command("StartScanning".to_string()));
        assert_eq!(format!("{}", msg_type), "Command::StartScanning");
    }

    #[test]
    fn test_message_summary() {
        let device_id = DeviceId::new("AA:BB");
        let command = Command::Connect {
            device_id: device_id.clone(),
        };
        assert!(command.summary().contains("AA:BB"));

        let event = Event::Connected {
            device: Device::new(device_id, Some("Speaker".to_string())),
        };
        assert_eq!(event.summary(), "device:Speaker (AA:BB)");
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(format!("{}", TaskId::SessionManager), "SessionManager");
        assert_eq!(
            format!("{}", TaskId::Capability(TaskKind::Bluetooth)),
            "Capability(BLE)"
        );
        assert_eq!(format!("{}", TaskId::Presentation), "Presentation");
    }

    #[test]
    fn test_tracing_logger_level_filtering() {
        let logger = TracingLogger::new(LogLevel::Warn);
        assert!(!logger.should_log(LogLevel::Debug));
        assert!(!logger.should_log(LogLevel::Info));
        assert!(logger.should_log(LogLevel::Warn));
        assert!(logger.should_log(LogLevel::Error));
    }
}
