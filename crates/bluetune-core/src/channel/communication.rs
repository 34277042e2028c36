//! CSP Channel Communication Protocol Types
//!
//! This module defines the typed communication protocol.
//! All inter-task communication flows through these channel message types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SessionError;
use crate::types::{ConnectionStatus, Device, DeviceId, PowerState, SessionSnapshot};

// ----------------------------------------------------------------------------
// Command: Presentation → Session Manager
// ----------------------------------------------------------------------------

/// User intents sent from presentation to the session manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Start discovering peripherals
    StartScanning,
    /// Stop discovering peripherals
    StopScanning,
    /// Open a connection to a previously discovered device
    Connect { device_id: DeviceId },
    /// Close the current connection
    Disconnect,
    /// Play the loaded clip on the connected device
    PlayAudio,
    /// Stop playback and rewind
    StopAudio,
    /// Request a `Snapshot` app event
    GetSnapshot,
    /// Shutdown the session gracefully
    Shutdown,
}

// ----------------------------------------------------------------------------
// Event: Capability Tasks → Session Manager
// ----------------------------------------------------------------------------

/// Outcomes reported by the adapter and audio tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Adapter power state changed
    AdapterStateChanged { state: PowerState },
    /// A peripheral advertisement was seen
    DeviceDiscovered { device: Device },
    /// A connection attempt succeeded
    Connected { device: Device },
    /// A connection attempt failed before the link came up
    ConnectionFailed { device_id: DeviceId, reason: String },
    /// A link was torn down, on request or by the peer
    Disconnected {
        device_id: DeviceId,
        error: Option<String>,
    },
    /// GATT service discovery completed
    ServicesDiscovered {
        device_id: DeviceId,
        services: Vec<Uuid>,
        error: Option<String>,
    },
    /// GATT characteristic discovery completed for one service
    CharacteristicsDiscovered {
        device_id: DeviceId,
        service: Uuid,
        characteristics: Vec<Uuid>,
        error: Option<String>,
    },
    /// Scan could not be started
    ScanFailed { reason: String },
    /// Adapter operation failed outside a connection attempt
    AdapterError { reason: String },
    /// The clip is loaded and playable
    AudioReady { clip: String },
    /// The clip could not be loaded
    AudioLoadFailed { reason: String },
    /// Playback started by the numbered `PlayAudio` reached the end of the clip
    PlaybackFinished { playback: u64 },
    /// The engine refused to play
    PlaybackFailed { reason: String },
}

impl Event {
    /// Task that produced this event
    pub fn source(&self) -> TaskKind {
        match self {
            Event::AudioReady { .. }
            | Event::AudioLoadFailed { .. }
            | Event::PlaybackFinished { .. }
            | Event::PlaybackFailed { .. } => TaskKind::Audio,
            _ => TaskKind::Bluetooth,
        }
    }
}

// ----------------------------------------------------------------------------
// Effect: Session Manager → Capability Tasks (External Side Effects Only)
// ----------------------------------------------------------------------------

/// Side-effect requests broadcast from the session manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    /// Begin discovery
    StartScan,
    /// Halt discovery
    StopScan,
    /// Open a connection
    Connect { device_id: DeviceId },
    /// Close a connection or cancel a pending one
    Disconnect { device_id: DeviceId },
    /// Start playback from the beginning
    ///
    /// `playback` numbers the request so a finish can be matched to it.
    PlayAudio { playback: u64 },
    /// Stop playback and rewind
    StopAudio,
}

impl Effect {
    /// Task this effect is addressed to
    pub fn target(&self) -> TaskKind {
        match self {
            Effect::PlayAudio { .. } | Effect::StopAudio => TaskKind::Audio,
            _ => TaskKind::Bluetooth,
        }
    }
}

// ----------------------------------------------------------------------------
// AppEvent: Session Manager → Presentation (State Changes Only)
// ----------------------------------------------------------------------------

/// State changes presentation needs to know about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppEvent {
    /// Adapter power state changed
    AdapterStateChanged { state: PowerState },
    /// Scanning flag changed
    ScanningChanged { active: bool },
    /// Discovered list was emptied for a new scan
    DeviceListCleared,
    /// A new device was appended to the discovered list
    DeviceDiscovered { device: Device },
    /// Connection lifecycle moved
    ConnectionChanged {
        status: ConnectionStatus,
        device: Option<Device>,
    },
    /// Playback flag changed
    PlaybackChanged { playing: bool },
    /// Clip readiness changed
    AudioReadinessChanged { ready: bool },
    /// Diagnostic GATT service listing
    ServicesDiscovered {
        device_id: DeviceId,
        services: Vec<Uuid>,
    },
    /// Diagnostic GATT characteristic listing
    CharacteristicsDiscovered {
        device_id: DeviceId,
        service: Uuid,
        characteristics: Vec<Uuid>,
    },
    /// A failure occurred
    SessionError { error: SessionError },
    /// Reply to `Command::GetSnapshot`
    Snapshot { snapshot: SessionSnapshot },
}

// ----------------------------------------------------------------------------
// Supporting Types
// ----------------------------------------------------------------------------

/// Capability task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    Bluetooth,
    Audio,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Bluetooth => write!(f, "BLE"),
            TaskKind::Audio => write!(f, "Audio"),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_display() {
        assert_eq!(format!("{}", TaskKind::Bluetooth), "BLE");
        assert_eq!(format!("{}", TaskKind::Audio), "Audio");
    }

    #[test]
    fn test_effect_routing() {
        assert_eq!(Effect::StartScan.target(), TaskKind::Bluetooth);
        assert_eq!(
            Effect::Disconnect {
                device_id: DeviceId::new("AA")
            }
            .target(),
            TaskKind::Bluetooth
        );
        assert_eq!(Effect::PlayAudio { playback: 1 }.target(), TaskKind::Audio);
        assert_eq!(Effect::StopAudio.target(), TaskKind::Audio);
    }

    #[test]
    fn test_event_source() {
        assert_eq!(Event::PlaybackFinished { playback: 1 }.source(), TaskKind::Audio);
        assert_eq!(
            Event::DeviceDiscovered {
                device: Device::new("AA", None)
            }
            .source(),
            TaskKind::Bluetooth
        );
    }

    #[test]
    fn test_command_serialization() {
        let cmd = Command::Connect {
            device_id: DeviceId::new("AA:BB:CC:DD:EE:FF"),
        };

        let serialized = serde_json::to_string(&cmd).unwrap();
        let deserialized: Command = serde_json::from_str(&serialized).unwrap();

        match deserialized {
            Command::Connect { device_id } => {
                assert_eq!(device_id.as_str(), "AA:BB:CC:DD:EE:FF");
            }
            _ => panic!("Wrong command type"),
        }
    }
}
