//! bluetune CLI Configuration Management
//!
//! Configuration is layered as defaults → TOML file → command line flags. The
//! file is either given with `--config` or looked up at
//! `~/.config/bluetune/config.toml`; a missing default file is not an error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use bluetune_audio::AudioConfig;
use bluetune_ble::BleConfig;
use bluetune_core::{BluetuneError, ChannelConfig, SessionConfig};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the bluetune CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// CSP channel buffer sizes
    pub channels: ChannelConfig,

    /// Session manager policy
    pub session: SessionConfig,

    /// Bluetooth adapter settings
    pub ble: BleConfig,

    /// Audio clip and output settings
    pub audio: AudioConfig,

    /// Front-end behaviour
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Prompt for the interactive console
    pub prompt: String,

    /// How long `scan` listens when no duration is given, in seconds
    pub scan_duration_secs: u64,

    /// How long `connect` waits for the device to appear and the link to come up, in seconds
    pub connect_timeout_secs: u64,

    /// How long to wait for the adapter to report power on, in seconds
    pub adapter_wait_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            prompt: "bluetune> ".to_string(),
            scan_duration_secs: 10,
            connect_timeout_secs: 15,
            adapter_wait_secs: 5,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load from `path`, or from the default location when it exists
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            info!("Loading configuration from: {}", path.display());
            return Self::load_from_file(path);
        }

        match Self::default_config_path() {
            Ok(default_path) if default_path.exists() => {
                info!("Loading configuration from: {}", default_path.display());
                Self::load_from_file(default_path)
            }
            Ok(_) => {
                info!("Using default configuration");
                Ok(Self::default())
            }
            Err(e) => {
                debug!("No default configuration location: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileSystem(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Loading(message) => {
                ConfigError::Loading(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Parse and validate TOML text
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Loading(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("bluetune").join("config.toml"))
            .ok_or_else(|| {
                ConfigError::Environment("No configuration directory for this user".to_string())
            })
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::FileSystem(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), toml_string)
            .map_err(|e| ConfigError::FileSystem(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.channels.validate()?;
        self.ble.validate()?;
        self.audio.validate()?;

        if self.cli.scan_duration_secs == 0 {
            return Err(ConfigError::Validation(
                "cli.scan_duration_secs must be greater than 0".to_string(),
            ));
        }
        if self.cli.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "cli.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Create example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| "# Failed to generate example config".to_string())
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<BluetuneError> for ConfigError {
    fn from(err: BluetuneError) -> Self {
        match err {
            BluetuneError::Configuration { message } => ConfigError::Validation(message),
            other => ConfigError::Validation(other.to_string()),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
