//! Error types for bluetune
//!
//! `SessionError` is the user-facing failure taxonomy. It is cloneable and
//! serializable so it can travel inside `AppEvent`s and snapshots.
//! `BluetuneError` covers infrastructure failures of the tasks themselves.

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionStatus, DeviceId};

// ----------------------------------------------------------------------------
// Session Errors
// ----------------------------------------------------------------------------

/// Failures observed by the session manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SessionError {
    #[error("Bluetooth adapter is not powered on")]
    AdapterUnavailable,
    #[error("Device {device_id} has not been discovered")]
    DeviceNotDiscovered { device_id: DeviceId },
    #[error("Connect to {device_id} rejected: session is {current}")]
    ConnectRejected {
        device_id: DeviceId,
        current: ConnectionStatus,
    },
    #[error("Connection to {device_id} failed: {reason}")]
    ConnectionFailed { device_id: DeviceId, reason: String },
    #[error("Disconnected from {device_id}: {reason}")]
    DisconnectedWithError { device_id: DeviceId, reason: String },
    #[error("GATT discovery failed on {device_id}: {reason}")]
    DiscoveryError { device_id: DeviceId, reason: String },
    #[error("Scan failed: {reason}")]
    ScanFailed { reason: String },
    #[error("Adapter error: {reason}")]
    AdapterError { reason: String },
    #[error("Audio clip failed to load: {reason}")]
    AudioLoadFailure { reason: String },
    #[error("Playback failed: {reason}")]
    PlaybackFailed { reason: String },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Infrastructure error for bluetune tasks
#[derive(Debug, thiserror::Error)]
pub enum BluetuneError {
    #[error("Channel error: {message}")]
    Channel { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Bluetooth adapter error: {message}")]
    Adapter { message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl BluetuneError {
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            message: message.into(),
        }
    }

    pub fn audio(message: impl Into<String>) -> Self {
        Self::Audio {
            message: message.into(),
        }
    }

    /// Errors after which a task loop cannot continue
    pub fn is_unrecoverable(&self) -> bool {
        matches!(
            self,
            BluetuneError::Channel { .. } | BluetuneError::Configuration { .. }
        )
    }
}

/// Result type for bluetune operations
pub type BluetuneResult<T> = Result<T, BluetuneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_messages() {
        let err = SessionError::ConnectRejected {
            device_id: DeviceId::new("AA"),
            current: ConnectionStatus::Connecting,
        };
        assert_eq!(
            err.to_string(),
            "Connect to AA rejected: session is Connecting"
        );
    }

    #[test]
    fn test_unrecoverable_classification() {
        assert!(BluetuneError::channel("closed").is_unrecoverable());
        assert!(BluetuneError::configuration("bad").is_unrecoverable());
        assert!(!BluetuneError::adapter("gone").is_unrecoverable());
        assert!(!BluetuneError::from(SessionError::AdapterUnavailable).is_unrecoverable());
    }
}
