//! Configuration shared by the session runtime
//!
//! Channel buffer sizing and session policy knobs. Adapter and audio settings
//! live in their own crates.

use serde::{Deserialize, Serialize};

use crate::errors::{BluetuneError, BluetuneResult};

// ----------------------------------------------------------------------------
// Channel Configuration
// ----------------------------------------------------------------------------

/// Buffer sizes for the CSP channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Buffer size for Command channels (Presentation → Session Manager)
    pub command_buffer_size: usize,
    /// Buffer size for Event channels (Capability tasks → Session Manager)
    pub event_buffer_size: usize,
    /// Buffer size for Effect channels (Session Manager → Capability tasks)
    pub effect_buffer_size: usize,
    /// Buffer size for AppEvent channels (Session Manager → Presentation)
    pub app_event_buffer_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 32,   // user intents are infrequent
            event_buffer_size: 256,    // advertisements arrive in bursts while scanning
            effect_buffer_size: 64,
            app_event_buffer_size: 256,
        }
    }
}

impl ChannelConfig {
    /// Create configuration for low-memory environments
    pub fn low_memory() -> Self {
        Self {
            command_buffer_size: 8,
            event_buffer_size: 32,
            effect_buffer_size: 16,
            app_event_buffer_size: 32,
        }
    }

    /// Create configuration optimized for testing
    pub fn testing() -> Self {
        Self {
            command_buffer_size: 100,
            event_buffer_size: 100,
            effect_buffer_size: 100,
            app_event_buffer_size: 100,
        }
    }

    pub fn validate(&self) -> BluetuneResult<()> {
        let sizes = [
            ("command_buffer_size", self.command_buffer_size),
            ("event_buffer_size", self.event_buffer_size),
            ("effect_buffer_size", self.effect_buffer_size),
            ("app_event_buffer_size", self.app_event_buffer_size),
        ];
        for (name, size) in sizes {
            if size == 0 {
                return Err(BluetuneError::configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Session manager policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Empty the discovered list whenever a new scan starts
    pub clear_devices_on_scan: bool,
    /// Start playback as soon as a connection is established
    pub auto_play_on_connect: bool,
    /// Stop playback when the connection goes away
    pub auto_stop_on_disconnect: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clear_devices_on_scan: true,
            auto_play_on_connect: true,
            auto_stop_on_disconnect: true,
        }
    }
}
