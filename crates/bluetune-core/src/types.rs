//! Core types for the bluetune session
//!
//! Devices, adapter power state, the explicit connection state machine and the
//! read-only snapshot handed to presentation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

// ----------------------------------------------------------------------------
// Device Identifier
// ----------------------------------------------------------------------------

/// Stable identifier of a BLE peripheral
///
/// The value is the platform peripheral id in its display form (a MAC address on
/// Linux/Windows, a UUID on Apple platforms). It is opaque to the session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a new device id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = crate::BluetuneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::BluetuneError::configuration("Empty device id"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ----------------------------------------------------------------------------
// Device
// ----------------------------------------------------------------------------

/// A discovered BLE peripheral
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Stable identifier
    pub id: DeviceId,
    /// Advertised local name, if any
    pub name: Option<String>,
    /// Signal strength of the advertisement that announced the device
    pub rssi: Option<i16>,
}

impl Device {
    /// Create a device with an optional display name
    pub fn new(id: impl Into<DeviceId>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
            rssi: None,
        }
    }

    /// Attach a signal strength reading
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Name to show to the user
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unknown Device")
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.id)
    }
}

// ----------------------------------------------------------------------------
// Adapter Power State
// ----------------------------------------------------------------------------

/// Power state reported by the Bluetooth adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PowerState {
    /// Adapter has not reported yet
    #[default]
    Unknown,
    PoweredOn,
    PoweredOff,
    /// No adapter present or the platform refused access
    Unavailable,
}

impl PowerState {
    pub fn is_powered_on(&self) -> bool {
        matches!(self, PowerState::PoweredOn)
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Unknown => write!(f, "Unknown"),
            PowerState::PoweredOn => write!(f, "PoweredOn"),
            PowerState::PoweredOff => write!(f, "PoweredOff"),
            PowerState::Unavailable => write!(f, "Unavailable"),
        }
    }
}

// ----------------------------------------------------------------------------
// Connection State Machine
// ----------------------------------------------------------------------------

/// Connection lifecycle of the single session link
///
/// `Connecting` and `Disconnecting` are entered by requests; `Connected` and
/// `Disconnected` are only entered on adapter events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting(Device),
    Connected(Device),
    Disconnecting(Device),
}

impl ConnectionState {
    /// Device involved in the current state, if any
    pub fn device(&self) -> Option<&Device> {
        match self {
            ConnectionState::Disconnected => None,
            ConnectionState::Connecting(device)
            | ConnectionState::Connected(device)
            | ConnectionState::Disconnecting(device) => Some(device),
        }
    }

    /// Device with a live link
    pub fn connected_device(&self) -> Option<&Device> {
        match self {
            ConnectionState::Connected(device) => Some(device),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected(_))
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, ConnectionState::Disconnected)
    }

    /// Status without the device payload
    pub fn status(&self) -> ConnectionStatus {
        match self {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting(_) => ConnectionStatus::Connecting,
            ConnectionState::Connected(_) => ConnectionStatus::Connected,
            ConnectionState::Disconnecting(_) => ConnectionStatus::Disconnecting,
        }
    }
}

/// Connection status for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting"),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

// ----------------------------------------------------------------------------
// Session Snapshot
// ----------------------------------------------------------------------------

/// Read-only view of the session handed to presentation
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Discovered devices, unique by id, in first-seen order
    pub devices: Vec<Device>,
    pub connection: ConnectionState,
    pub is_scanning: bool,
    pub is_playing: bool,
    pub is_audio_ready: bool,
    pub adapter_state: PowerState,
    /// Most recent failure, kept until replaced
    pub last_error: Option<SessionError>,
}

impl SessionSnapshot {
    pub fn connected_device(&self) -> Option<&Device> {
        self.connection.connected_device()
    }

    /// Look up a discovered device by id or, failing that, by exact name
    pub fn find_device(&self, needle: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.id.as_str() == needle)
            .or_else(|| self.devices.iter().find(|d| d.name.as_deref() == Some(needle)))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_display_name_fallback() {
        let named = Device::new("AA:BB", Some("Speaker".to_string()));
        let unnamed = Device::new("CC:DD", None);
        assert_eq!(named.display_name(), "Speaker");
        assert_eq!(unnamed.display_name(), "Unknown Device");
        assert_eq!(format!("{}", named), "Speaker (AA:BB)");
    }

    #[test]
    fn test_device_id_parsing() {
        let id: DeviceId = "  AA:BB:CC  ".parse().unwrap();
        assert_eq!(id.as_str(), "AA:BB:CC");
        assert!("   ".parse::<DeviceId>().is_err());
    }

    #[test]
    fn test_connection_state_accessors() {
        let device = Device::new("AA", None);
        let state = ConnectionState::Connecting(device.clone());
        assert_eq!(state.device(), Some(&device));
        assert!(state.connected_device().is_none());
        assert_eq!(state.status(), ConnectionStatus::Connecting);

        let state = ConnectionState::Connected(device.clone());
        assert!(state.is_connected());
        assert_eq!(state.connected_device(), Some(&device));
        assert!(ConnectionState::default().is_disconnected());
    }

    #[test]
    fn test_snapshot_find_device() {
        let snapshot = SessionSnapshot {
            devices: vec![
                Device::new("AA", Some("Left".to_string())),
                Device::new("BB", Some("Right".to_string())),
            ],
            ..Default::default()
        };
        assert_eq!(snapshot.find_device("BB").map(|d| d.id.as_str()), Some("BB"));
        assert_eq!(snapshot.find_device("Left").map(|d| d.id.as_str()), Some("AA"));
        assert!(snapshot.find_device("Nope").is_none());
    }

    #[test]
    fn test_power_state_display() {
        assert_eq!(format!("{}", PowerState::PoweredOn), "PoweredOn");
        assert!(PowerState::PoweredOn.is_powered_on());
        assert!(!PowerState::Unknown.is_powered_on());
    }
}
