//! Channel Utilities for CSP Communication
//!
//! Tokio-backed channel aliases and constructors. Commands, events and app events
//! are bounded mpsc channels; effects are broadcast so every capability task sees
//! every effect and filters by `Effect::target()`. The latest session snapshot is
//! published on a `watch` channel.

use std::fmt;

use tokio::sync::{broadcast, mpsc, watch};

use crate::channel::communication::{AppEvent, Command, Effect, Event};
use crate::config::ChannelConfig;
use crate::types::SessionSnapshot;

#[derive(Debug, PartialEq, Eq)]
pub enum ChannelError {
    ChannelFull,
    ChannelClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ChannelFull => write!(f, "Channel buffer is full"),
            ChannelError::ChannelClosed => write!(f, "Channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;
pub type EffectSender = broadcast::Sender<Effect>;
pub type EffectReceiver = broadcast::Receiver<Effect>;
pub type AppEventSender = mpsc::Sender<AppEvent>;
pub type AppEventReceiver = mpsc::Receiver<AppEvent>;
pub type SnapshotSender = watch::Sender<SessionSnapshot>;
pub type SnapshotReceiver = watch::Receiver<SessionSnapshot>;

// ----------------------------------------------------------------------------
// Channel Creation Utilities
// ----------------------------------------------------------------------------

/// Create bounded command channel (Presentation → Session Manager)
pub fn create_command_channel(config: &ChannelConfig) -> (CommandSender, CommandReceiver) {
    mpsc::channel(config.command_buffer_size)
}

/// Create bounded event channel (Capability tasks → Session Manager)
pub fn create_event_channel(config: &ChannelConfig) -> (EventSender, EventReceiver) {
    mpsc::channel(config.event_buffer_size)
}

/// Create broadcast effect channel (One-to-Many: Session Manager → Capability tasks)
///
/// Tasks obtain their own receiver through [`create_effect_receiver`].
pub fn create_effect_channel(config: &ChannelConfig) -> (EffectSender, EffectReceiver) {
    broadcast::channel(config.effect_buffer_size)
}

/// Create an effect receiver by subscribing to the broadcast channel
pub fn create_effect_receiver(effect_sender: &EffectSender) -> EffectReceiver {
    effect_sender.subscribe()
}

/// Create bounded app event channel (Session Manager → Presentation)
pub fn create_app_event_channel(config: &ChannelConfig) -> (AppEventSender, AppEventReceiver) {
    mpsc::channel(config.app_event_buffer_size)
}

/// Create the snapshot channel seeded with an empty session
pub fn create_snapshot_channel() -> (SnapshotSender, SnapshotReceiver) {
    watch::channel(SessionSnapshot::default())
}

// ----------------------------------------------------------------------------
// Non-blocking Send Utilities
// ----------------------------------------------------------------------------

/// Non-blocking send for presentation code that must not stall
pub trait NonBlockingSend<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl<T> NonBlockingSend<T> for mpsc::Sender<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError> {
        self.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}

// ----------------------------------------------------------------------------
// Channel Statistics
// ----------------------------------------------------------------------------

/// Fill level of a bounded mpsc channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStats {
    pub capacity: usize,
    pub queued: usize,
}

impl ChannelStats {
    pub fn of<T>(sender: &mpsc::Sender<T>) -> Self {
        let capacity = sender.max_capacity();
        Self {
            capacity,
            queued: capacity.saturating_sub(sender.capacity()),
        }
    }

    /// Fraction of the buffer in use, 0.0..=1.0
    pub fn utilization(&self) -> f32 {
        if self.capacity == 0 {
            return 0.0;
        }
        self.queued as f32 / self.capacity as f32
    }
}
