//! Audio engine capability for bluetune
//!
//! - [`engine`] - the `AudioEngine` trait and clip types
//! - [`rodio_engine`] - playback on the default output device
//! - [`silent`] - an engine without output, for `--no-audio` and tests
//! - [`task`] - `AudioTask`, which loads the clip and answers play/stop effects

mod config;
mod engine;
mod error;
mod rodio_engine;
mod silent;
mod task;

pub use config::AudioConfig;
pub use engine::{AudioEngine, ClipHandle, ClipSource};
pub use error::{AudioError, AudioResult};
pub use rodio_engine::RodioEngine;
pub use silent::SilentEngine;
pub use task::AudioTask;
