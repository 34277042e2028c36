//! Error types for the audio engine

use std::path::PathBuf;

use bluetune_core::BluetuneError;
use thiserror::Error;

/// Errors specific to clip loading and playback
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio clip not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode clip: {0}")]
    Decode(String),

    #[error("Audio output unavailable: {0}")]
    OutputUnavailable(String),

    #[error("No clip loaded")]
    NotLoaded,

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Clip loader stopped: {0}")]
    Loader(String),

    #[error("Task started without channels")]
    NotAttached,

    #[error("Event channel closed")]
    ChannelClosed,
}

impl From<AudioError> for BluetuneError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::NotAttached | AudioError::ChannelClosed => {
                BluetuneError::channel(err.to_string())
            }
            other => BluetuneError::audio(other.to_string()),
        }
    }
}

pub type AudioResult<T> = Result<T, AudioError>;
