//! Error handling for the bluetune CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("bluetune error: {0}")]
    Bluetune(#[from] bluetune_core::BluetuneError),

    #[error("Session error: {0}")]
    Session(#[from] bluetune_core::SessionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No discovered device matches '{query}'")]
    DeviceNotFound { query: String },

    #[error("Timed out waiting for {what}")]
    Timeout { what: String },

    #[error("Session stopped unexpectedly")]
    SessionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn timeout(what: impl Into<String>) -> Self {
        Self::Timeout { what: what.into() }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
