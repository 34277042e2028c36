//! Audio Task Implementation

use async_trait::async_trait;
use bluetune_core::{
    internal::{EffectReceiver, EventSender},
    BluetuneResult, Effect, Event, SessionTask, TaskKind,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::config::AudioConfig;
use crate::engine::{AudioEngine, ClipHandle, ClipSource};
use crate::error::{AudioError, AudioResult};

// ----------------------------------------------------------------------------
// Audio Task
// ----------------------------------------------------------------------------

/// Capability task owning the audio engine and the loaded clip
///
/// The clip is loaded once when the task starts. A failed load is reported and
/// never retried; later play requests are answered with `PlaybackFailed`.
pub struct AudioTask<E: AudioEngine> {
    config: AudioConfig,
    /// Only absent while the clip loader holds it
    engine: Option<E>,
    clip: Option<ClipHandle>,
    /// Number of the play request currently sounding
    playing: Option<u64>,
    event_sender: Option<EventSender>,
    effect_receiver: Option<EffectReceiver>,
}

impl<E: AudioEngine + 'static> AudioTask<E> {
    pub fn new(config: AudioConfig, engine: E) -> Self {
        Self {
            config,
            engine: Some(engine),
            clip: None,
            playing: None,
            event_sender: None,
            effect_receiver: None,
        }
    }

    /// Read and decode the clip on the blocking pool
    async fn load_clip(&mut self) -> AudioResult<Event> {
        let mut engine = self
            .engine
            .take()
            .ok_or_else(|| AudioError::Loader("engine already taken".to_string()))?;
        let source = ClipSource::new(&self.config.clip_path);

        let (engine, loaded) = tokio::task::spawn_blocking(move || {
            let loaded = engine.load(&source);
            (engine, loaded)
        })
        .await
        .map_err(|e| AudioError::Loader(e.to_string()))?;
        self.engine = Some(engine);

        let event = match loaded {
            Ok(clip) => {
                match clip.duration {
                    Some(length) => info!("Loaded {} ({:.1}s)", clip.name, length.as_secs_f32()),
                    None => info!("Loaded {}", clip.name),
                }
                let name = clip.name.clone();
                self.clip = Some(clip);
                Event::AudioReady { clip: name }
            }
            Err(e) => {
                error!("Error loading audio file: {}", e);
                Event::AudioLoadFailed {
                    reason: e.to_string(),
                }
            }
        };
        Ok(event)
    }

    fn handle_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::PlayAudio { playback } => {
                let (Some(engine), Some(clip)) = (self.engine.as_mut(), &self.clip) else {
                    return Some(Event::PlaybackFailed {
                        reason: AudioError::NotLoaded.to_string(),
                    });
                };
                match engine.play(clip) {
                    Ok(()) => {
                        self.playing = Some(playback);
                        None
                    }
                    Err(e) => {
                        error!("Error playing {}: {}", clip.name, e);
                        self.playing = None;
                        Some(Event::PlaybackFailed {
                            reason: e.to_string(),
                        })
                    }
                }
            }
            Effect::StopAudio => {
                self.stop_engine();
                self.playing = None;
                None
            }
            other => {
                debug!("Audio task ignoring {:?}", other);
                None
            }
        }
    }

    fn stop_engine(&mut self) {
        if let (Some(engine), Some(clip)) = (self.engine.as_mut(), &self.clip) {
            engine.stop(clip);
        }
    }

    /// Report a clip that ran to its end
    fn poll_finished(&mut self) -> Option<Event> {
        let playback = self.playing?;
        let (engine, clip) = (self.engine.as_ref()?, self.clip.as_ref()?);
        if engine.is_playing(clip) {
            return None;
        }
        self.playing = None;
        Some(Event::PlaybackFinished { playback })
    }

    async fn run_internal(&mut self) -> AudioResult<()> {
        info!("Audio task starting");

        let events = self.event_sender.clone().ok_or(AudioError::NotAttached)?;
        let mut effects = self.effect_receiver.take().ok_or(AudioError::NotAttached)?;

        let loaded = self.load_clip().await?;
        send(&events, loaded).await?;

        let mut poll = tokio::time::interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                effect = effects.recv() => {
                    match effect {
                        Ok(effect) if effect.target() == TaskKind::Audio => {
                            if let Some(event) = self.handle_effect(effect) {
                                send(&events, event).await?;
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Audio task lagged, {} effects skipped", skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("Effect channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = poll.tick(), if self.playing.is_some() => {
                    if let Some(event) = self.poll_finished() {
                        send(&events, event).await?;
                    }
                }
            }
        }

        self.stop_engine();
        info!("Audio task stopped");
        Ok(())
    }
}

async fn send(events: &EventSender, event: Event) -> AudioResult<()> {
    events.send(event).await.map_err(|_| AudioError::ChannelClosed)
}

#[async_trait]
impl<E: AudioEngine + 'static> SessionTask for AudioTask<E> {
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> BluetuneResult<()> {
        self.config.validate()?;
        self.event_sender = Some(event_sender);
        self.effect_receiver = Some(effect_receiver);
        Ok(())
    }

    async fn run(&mut self) -> BluetuneResult<()> {
        self.run_internal().await.map_err(Into::into)
    }

    fn task_kind(&self) -> TaskKind {
        TaskKind::Audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::silent::SilentEngine;
    use std::time::Duration;
    use tokio_test::assert_ok;

    #[test]
    fn test_play_before_load_reports_failure() {
        let mut task = AudioTask::new(AudioConfig::default(), SilentEngine::new());
        let event = task.handle_effect(Effect::PlayAudio { playback: 1 });
        assert!(matches!(event, Some(Event::PlaybackFailed { .. })));
        assert!(task.playing.is_none());
    }

    #[tokio::test]
    async fn test_finished_reported_once_with_its_number() {
        let engine = SilentEngine::new().with_length(Duration::ZERO);
        let mut task = AudioTask::new(AudioConfig::default(), engine);
        let loaded = assert_ok!(task.load_clip().await);
        assert!(matches!(loaded, Event::AudioReady { .. }));

        assert!(task.handle_effect(Effect::PlayAudio { playback: 7 }).is_none());
        assert_eq!(
            task.poll_finished(),
            Some(Event::PlaybackFinished { playback: 7 })
        );
        assert_eq!(task.poll_finished(), None);
    }

    #[tokio::test]
    async fn test_restart_reports_latest_number() {
        let engine = SilentEngine::new().with_length(Duration::from_secs(60));
        let mut task = AudioTask::new(AudioConfig::default(), engine);
        assert_ok!(task.load_clip().await);

        task.handle_effect(Effect::PlayAudio { playback: 1 });
        task.handle_effect(Effect::StopAudio);
        assert_eq!(task.poll_finished(), None);

        task.handle_effect(Effect::PlayAudio { playback: 2 });
        assert_eq!(task.playing, Some(2));
        assert_eq!(task.poll_finished(), None);
    }

    #[tokio::test]
    async fn test_load_failure_event_carries_reason() {
        let mut task = AudioTask::new(AudioConfig::default(), SilentEngine::failing("bad frame"));
        match assert_ok!(task.load_clip().await) {
            Event::AudioLoadFailed { reason } => assert!(reason.contains("bad frame")),
            other => panic!("unexpected event {:?}", other),
        }
        // The engine is handed back after loading
        assert!(task.engine.is_some());
    }
}
