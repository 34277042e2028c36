//! Audio engine configuration

use std::path::PathBuf;
use std::time::Duration;

use bluetune_core::{BluetuneError, BluetuneResult};

/// Configuration for the audio task
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Clip played on connect
    pub clip_path: PathBuf,
    /// How often the engine is polled for end of playback, in milliseconds
    pub poll_interval_ms: u64,
    /// Output gain, 1.0 is unchanged
    pub volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            clip_path: PathBuf::from("song.mp3"),
            poll_interval_ms: 200,
            volume: 1.0,
        }
    }
}

impl AudioConfig {
    pub fn with_clip(mut self, path: impl Into<PathBuf>) -> Self {
        self.clip_path = path.into();
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> BluetuneResult<()> {
        if self.clip_path.as_os_str().is_empty() {
            return Err(BluetuneError::configuration("audio.clip_path is empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(BluetuneError::configuration(
                "audio.poll_interval_ms must be greater than 0",
            ));
        }
        if !(0.0..=2.0).contains(&self.volume) {
            return Err(BluetuneError::configuration(format!(
                "audio.volume {} is outside 0.0..=2.0",
                self.volume
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_clip() {
        let config = AudioConfig::default();
        assert_eq!(config.clip_path, PathBuf::from("song.mp3"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = AudioConfig {
            volume: 3.0,
            ..AudioConfig::default()
        };
        assert!(config.validate().is_err());

        let config = AudioConfig::default().with_clip("");
        assert!(config.validate().is_err());
    }
}
