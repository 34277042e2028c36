//! bluetune runtime
//!
//! The session manager and the orchestration around it:
//! - `SessionManager`: connection state machine and auto play/stop policy
//! - `SessionLogicTask`: the serialized loop that owns the manager
//! - `RuntimeBuilder` / `RuntimeHandle`: wiring capability tasks to the loop
//!
//! `bluetune-core` holds the vocabulary; this crate is where it is acted upon.

pub mod builder;
pub mod logic;

pub use builder::{RuntimeBuilder, RuntimeHandle};
pub use logic::{Outcome, SessionLogicTask, SessionManager};

// Re-export core types for convenience
pub use bluetune_core::{
    channel::utils::{
        AppEventReceiver, CommandSender, EffectReceiver, EventSender, SnapshotReceiver,
    },
    AppEvent, BluetuneError, BluetuneResult, ChannelConfig, Command, ConnectionState,
    ConnectionStatus, Device, DeviceId, Effect, Event, PowerState, SessionConfig, SessionError,
    SessionSnapshot, SessionTask, TaskKind,
};
