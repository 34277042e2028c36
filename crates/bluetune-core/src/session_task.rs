//! Session Task Trait Definition
//!
//! Defines the common interface for the capability tasks that sit around the
//! session manager. Concrete implementations live in their respective crates
//! (`bluetune-ble`, `bluetune-audio`).

use crate::channel::{EffectReceiver, EventSender, TaskKind};
use crate::errors::BluetuneResult;

// ----------------------------------------------------------------------------
// Session Task Trait
// ----------------------------------------------------------------------------

/// Common interface for capability tasks
///
/// Capability tasks are independent async tasks wrapping one external stack
/// (the Bluetooth adapter or the audio engine). They communicate with the
/// session manager via CSP channels only.
///
/// ## Architecture
///
/// Each task:
/// - Runs independently with its own async event loop via the `run()` method
/// - Receives effects from the session manager via `EffectReceiver`
/// - Reports outcomes to the session manager via `EventSender`
/// - Maintains no shared state with other tasks
/// - Lifecycle (spawning/aborting) is managed by the runtime
#[async_trait::async_trait]
pub trait SessionTask: Send {
    /// Attach CSP channels created by the runtime
    ///
    /// Implementations must store these handles and use them for all
    /// communication with the session manager.
    fn attach_channels(
        &mut self,
        event_sender: EventSender,
        effect_receiver: EffectReceiver,
    ) -> BluetuneResult<()>;

    /// Run the task's main loop until its channels close
    async fn run(&mut self) -> BluetuneResult<()>;

    /// Which capability this task provides
    fn task_kind(&self) -> TaskKind;
}
