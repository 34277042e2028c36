//! bluetune core types
//!
//! Shared vocabulary for the bluetune device session manager: devices and the
//! connection state machine, the CSP channel protocol between the session
//! manager and its capability tasks, error types and configuration.
//!
//! ## Channel topology
//!
//! ```text
//! Presentation --Command--> SessionManager --Effect (broadcast)--> BLE / Audio tasks
//! Presentation <-AppEvent-- SessionManager <-------Event---------- BLE / Audio tasks
//! ```

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod channel;
pub mod config;
pub mod errors;
pub mod session_task;
pub mod task_logging;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use channel::{AppEvent, Command, Effect, Event, TaskKind};
pub use config::{ChannelConfig, SessionConfig};
pub use errors::{BluetuneError, BluetuneResult, SessionError};
pub use session_task::SessionTask;
pub use types::{ConnectionState, ConnectionStatus, Device, DeviceId, PowerState, SessionSnapshot};

/// Internal types for crate-internal and runtime use
pub mod internal {
    pub use crate::channel::utils::*;
    pub use crate::task_logging::{
        Direction, LogLevel, MessageSummary, MessageType, NoOpLogger, TaskId, TaskLogger,
        TracingLogger,
    };
}
