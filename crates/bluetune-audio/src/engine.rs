//! Audio engine abstraction
//!
//! The session only ever asks for two things: start the clip from the top, and
//! stop it. Engines keep whatever decoded or buffered state they need behind a
//! `ClipHandle` returned from `load`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AudioResult;

// ----------------------------------------------------------------------------
// Clips
// ----------------------------------------------------------------------------

/// Where a clip comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipSource {
    path: PathBuf,
}

impl ClipSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name for logs and readiness reports
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// A clip loaded into an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipHandle {
    pub(crate) index: usize,
    pub name: String,
    /// Known only when the decoder can tell
    pub duration: Option<Duration>,
}

// ----------------------------------------------------------------------------
// Engine Trait
// ----------------------------------------------------------------------------

/// Playback backend driven by `AudioTask`
pub trait AudioEngine: Send {
    /// Load and validate a clip so later plays cannot fail on decoding
    fn load(&mut self, source: &ClipSource) -> AudioResult<ClipHandle>;

    /// Start the clip from position zero, cutting off any current playback
    fn play(&mut self, clip: &ClipHandle) -> AudioResult<()>;

    /// Halt and rewind; no-op when idle
    fn stop(&mut self, clip: &ClipHandle);

    fn is_playing(&self, clip: &ClipHandle) -> bool;
}
