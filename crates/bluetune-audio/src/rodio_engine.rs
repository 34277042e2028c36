//! Audio output using rodio

use std::io::{self, Cursor};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use tracing::{debug, info, warn};

use crate::engine::{AudioEngine, ClipHandle, ClipSource};
use crate::error::{AudioError, AudioResult};

// ----------------------------------------------------------------------------
// Output Thread
// ----------------------------------------------------------------------------

/// Keeps the `OutputStream` alive on its own thread
///
/// rodio streams are not `Send`; only the handle leaves the thread. Dropping
/// this closes the shutdown channel and the stream with it.
struct OutputThread {
    handle: OutputStreamHandle,
    shutdown: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputThread {
    fn open() -> AudioResult<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("bluetune-audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    // Blocks until the sender is dropped
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| AudioError::OutputUnavailable(e.to_string()))?;

        let handle = ready_rx
            .recv()
            .map_err(|_| AudioError::OutputUnavailable("output thread exited".to_string()))?
            .map_err(AudioError::OutputUnavailable)?;

        info!("Audio output stream opened");
        Ok(Self {
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

impl Drop for OutputThread {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Audio output thread panicked");
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Rodio Engine
// ----------------------------------------------------------------------------

/// Plays clips on the default output device
///
/// Clips are held in memory and decoded afresh for every play, so each start
/// is from position zero.
pub struct RodioEngine {
    clips: Vec<Arc<[u8]>>,
    output: Option<OutputThread>,
    /// Sink of the clip currently playing
    sink: Option<(usize, Sink)>,
    volume: f32,
}

impl Default for RodioEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioEngine {
    pub fn new() -> Self {
        Self {
            clips: Vec::new(),
            output: None,
            sink: None,
            volume: 1.0,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    fn decoder(bytes: Arc<[u8]>) -> AudioResult<Decoder<Cursor<Arc<[u8]>>>> {
        Decoder::new(Cursor::new(bytes)).map_err(|e| AudioError::Decode(e.to_string()))
    }
}

impl AudioEngine for RodioEngine {
    fn load(&mut self, source: &ClipSource) -> AudioResult<ClipHandle> {
        let path = source.path();
        let bytes: Arc<[u8]> = std::fs::read(path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => AudioError::NotFound {
                    path: path.to_path_buf(),
                },
                _ => AudioError::Read {
                    path: path.to_path_buf(),
                    source: e,
                },
            })?
            .into();

        let decoder = Self::decoder(bytes.clone())?;
        let duration = decoder.total_duration();
        debug!(
            "Decoded {}: {} Hz, {} channels",
            source.name(),
            decoder.sample_rate(),
            decoder.channels()
        );

        if self.output.is_none() {
            self.output = Some(OutputThread::open()?);
        }

        self.clips.push(bytes);
        Ok(ClipHandle {
            index: self.clips.len() - 1,
            name: source.name(),
            duration,
        })
    }

    fn play(&mut self, clip: &ClipHandle) -> AudioResult<()> {
        let bytes = self
            .clips
            .get(clip.index)
            .cloned()
            .ok_or(AudioError::NotLoaded)?;
        let output = self.output.as_ref().ok_or_else(|| {
            AudioError::OutputUnavailable("output stream not open".to_string())
        })?;

        if let Some((_, previous)) = self.sink.take() {
            previous.stop();
        }

        // New sink and decoder, so the clip starts at zero
        let sink =
            Sink::try_new(&output.handle).map_err(|e| AudioError::Playback(e.to_string()))?;
        sink.set_volume(self.volume);
        sink.append(Self::decoder(bytes)?);

        debug!("Playing {}", clip.name);
        self.sink = Some((clip.index, sink));
        Ok(())
    }

    fn stop(&mut self, clip: &ClipHandle) {
        if matches!(&self.sink, Some((index, _)) if *index == clip.index) {
            if let Some((_, sink)) = self.sink.take() {
                sink.stop();
                debug!("Stopped {}", clip.name);
            }
        }
    }

    fn is_playing(&self, clip: &ClipHandle) -> bool {
        self.sink
            .as_ref()
            .is_some_and(|(index, sink)| *index == clip.index && !sink.empty())
    }
}
