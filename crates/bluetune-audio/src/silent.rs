//! Engine without an output device

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::engine::{AudioEngine, ClipHandle, ClipSource};
use crate::error::{AudioError, AudioResult};

/// Pretends to play clips
///
/// With a nominal length set, playback "finishes" once that much time has
/// passed; without one it runs until stopped.
#[derive(Debug, Default)]
pub struct SilentEngine {
    nominal_length: Option<Duration>,
    load_failure: Option<String>,
    loaded: Vec<String>,
    started: Option<(usize, Instant)>,
    plays: Arc<AtomicUsize>,
}

impl SilentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_length(mut self, length: Duration) -> Self {
        self.nominal_length = Some(length);
        self
    }

    /// Every load fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            load_failure: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Counter of `play` calls, shared so it can be read after the engine moves
    pub fn play_counter(&self) -> Arc<AtomicUsize> {
        self.plays.clone()
    }

    /// How far into `clip` playback has got, `None` when it is not sounding
    pub fn position(&self, clip: &ClipHandle) -> Option<Duration> {
        match self.started {
            Some((index, at)) if index == clip.index && self.is_playing(clip) => {
                Some(at.elapsed())
            }
            _ => None,
        }
    }
}

impl AudioEngine for SilentEngine {
    fn load(&mut self, source: &ClipSource) -> AudioResult<ClipHandle> {
        if let Some(reason) = &self.load_failure {
            return Err(AudioError::Decode(reason.clone()));
        }
        self.loaded.push(source.name());
        Ok(ClipHandle {
            index: self.loaded.len() - 1,
            name: source.name(),
            duration: self.nominal_length,
        })
    }

    fn play(&mut self, clip: &ClipHandle) -> AudioResult<()> {
        if clip.index >= self.loaded.len() {
            return Err(AudioError::NotLoaded);
        }
        debug!("Silently playing {}", clip.name);
        self.started = Some((clip.index, Instant::now()));
        self.plays.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self, clip: &ClipHandle) {
        if matches!(self.started, Some((index, _)) if index == clip.index) {
            self.started = None;
        }
    }

    fn is_playing(&self, clip: &ClipHandle) -> bool {
        match self.started {
            Some((index, at)) if index == clip.index => self
                .nominal_length
                .map_or(true, |length| at.elapsed() < length),
            _ => false,
        }
    }
}
