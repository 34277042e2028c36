//! Session Logic Module
//!
//! The session manager split into focused components:
//! - `state`: session state, statistics and the logger wrapper
//! - `handlers`: `SessionManager` operations and event handlers
//! - `task`: `SessionLogicTask`, the single loop that serializes them
//!
//! ## Serialization
//!
//! User commands and adapter or engine events arrive on separate channels but are
//! handled one at a time by `SessionLogicTask`. Handlers never await; they return
//! the effects to broadcast and the app events to publish, so the connection slot,
//! device list and playback flag are only ever touched from this one task.

pub mod handlers;
pub mod state;
pub mod task;

pub use handlers::{Outcome, SessionManager};
pub use state::{AudioReadiness, LoggerWrapper, SessionState, SessionStats};
pub use task::SessionLogicTask;
