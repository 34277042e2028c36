//! Runtime Builder API
//!
//! Builder-style API for consumers (CLI and tests) to register capability tasks
//! and get command, app-event and snapshot handles back.

use std::time::Duration;

use bluetune_core::{
    internal::{
        create_app_event_channel, create_command_channel, create_effect_channel,
        create_effect_receiver, create_event_channel, create_snapshot_channel,
        AppEventReceiver, CommandSender, EffectSender, LogLevel, NoOpLogger, SnapshotReceiver,
        TracingLogger,
    },
    BluetuneError, BluetuneResult, ChannelConfig, Command, DeviceId, SessionConfig,
    SessionSnapshot, SessionTask, TaskKind,
};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::logic::{LoggerWrapper, SessionLogicTask};

/// How long `shutdown` waits for the session loop to drain
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder wiring the session logic task to its capability tasks
pub struct RuntimeBuilder {
    session_config: SessionConfig,
    channel_config: ChannelConfig,
    tasks: Vec<Box<dyn SessionTask>>,
    logger: LoggerWrapper,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            session_config: SessionConfig::default(),
            channel_config: ChannelConfig::default(),
            tasks: Vec::new(),
            logger: LoggerWrapper::NoOp(NoOpLogger),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    pub fn with_channel_config(mut self, config: ChannelConfig) -> Self {
        self.channel_config = config;
        self
    }

    /// Add a capability task (Bluetooth adapter or audio engine)
    pub fn add_task(mut self, task: Box<dyn SessionTask>) -> Self {
        self.tasks.push(task);
        self
    }

    /// Log channel traffic through `tracing` at or above `level`
    pub fn with_tracing_logging(mut self, level: LogLevel) -> Self {
        self.logger = LoggerWrapper::Tracing(TracingLogger::new(level));
        self
    }

    pub fn with_no_logging(mut self) -> Self {
        self.logger = LoggerWrapper::NoOp(NoOpLogger);
        self
    }

    /// Build the channels, spawn every task and return a handle
    pub async fn build_and_start(self) -> BluetuneResult<RuntimeHandle> {
        info!("Building bluetune runtime");

        self.channel_config.validate()?;

        let channel_config = self.channel_config;
        let (command_sender, command_receiver) = create_command_channel(&channel_config);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&channel_config);
        let (event_sender, event_receiver) = create_event_channel(&channel_config);
        let (effect_sender, _effect_receiver) = create_effect_channel(&channel_config);
        let (snapshot_sender, snapshot_receiver) = create_snapshot_channel();

        // Capability tasks subscribe before the loop can broadcast anything
        let mut task_handles = Vec::with_capacity(self.tasks.len());
        for mut task in self.tasks {
            let kind = task.task_kind();
            task.attach_channels(event_sender.clone(), create_effect_receiver(&effect_sender))?;

            let handle = tokio::spawn(async move {
                let result = task.run().await;
                if let Err(e) = &result {
                    warn!("{} task exited with error: {}", kind, e);
                }
                result
            });
            task_handles.push((kind, handle));
        }
        // Only the tasks hold event senders now
        drop(event_sender);

        let mut logic = SessionLogicTask::new(
            self.session_config,
            command_receiver,
            event_receiver,
            effect_sender.clone(),
            app_event_sender,
            snapshot_sender,
            self.logger,
        );
        let logic_handle = tokio::spawn(async move { logic.run().await });

        info!(
            "bluetune runtime started with {} capability tasks",
            task_handles.len()
        );

        Ok(RuntimeHandle {
            command_sender,
            effect_sender,
            app_event_receiver: Some(app_event_receiver),
            snapshot_receiver,
            logic_handle: Some(logic_handle),
            task_handles,
            running: true,
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running session
pub struct RuntimeHandle {
    command_sender: CommandSender,
    effect_sender: EffectSender,
    app_event_receiver: Option<AppEventReceiver>,
    snapshot_receiver: SnapshotReceiver,
    logic_handle: Option<JoinHandle<BluetuneResult<()>>>,
    task_handles: Vec<(TaskKind, JoinHandle<BluetuneResult<()>>)>,
    running: bool,
}

impl RuntimeHandle {
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Watch the session snapshot
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshot_receiver.clone()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_receiver.borrow().clone()
    }

    /// Observe the effects broadcast to capability tasks
    pub fn subscribe_effects(&self) -> bluetune_core::internal::EffectReceiver {
        create_effect_receiver(&self.effect_sender)
    }

    pub async fn send_command(&self, command: Command) -> BluetuneResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| BluetuneError::channel("Failed to send command to session"))
    }

    pub async fn start_scanning(&self) -> BluetuneResult<()> {
        self.send_command(Command::StartScanning).await
    }

    pub async fn stop_scanning(&self) -> BluetuneResult<()> {
        self.send_command(Command::StopScanning).await
    }

    pub async fn connect(&self, device_id: DeviceId) -> BluetuneResult<()> {
        self.send_command(Command::Connect { device_id }).await
    }

    pub async fn disconnect(&self) -> BluetuneResult<()> {
        self.send_command(Command::Disconnect).await
    }

    pub async fn play_audio(&self) -> BluetuneResult<()> {
        self.send_command(Command::PlayAudio).await
    }

    pub async fn stop_audio(&self) -> BluetuneResult<()> {
        self.send_command(Command::StopAudio).await
    }

    pub fn is_running(&self) -> bool {
        self.running
            && self
                .logic_handle
                .as_ref()
                .is_some_and(|h| !h.is_finished())
    }

    /// Shut the session down and abort the capability tasks
    pub async fn shutdown(&mut self) -> BluetuneResult<()> {
        info!("Shutting down bluetune runtime");

        let _ = self.send_command(Command::Shutdown).await;

        if let Some(handle) = self.logic_handle.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err() {
                warn!("Session logic task did not stop in time");
            }
        }

        for (kind, handle) in &self.task_handles {
            if !handle.is_finished() {
                info!("Stopping {} task", kind);
            }
            handle.abort();
        }

        self.running = false;
        info!("bluetune runtime shut down");
        Ok(())
    }
}

/// Runtime with quiet logging and small buffers for tests
pub async fn create_test_runtime(
    tasks: Vec<Box<dyn SessionTask>>,
) -> BluetuneResult<RuntimeHandle> {
    tasks
        .into_iter()
        .fold(
            RuntimeBuilder::new()
                .with_no_logging()
                .with_channel_config(ChannelConfig::testing()),
            |builder, task| builder.add_task(task),
        )
        .build_and_start()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runtime_builder() {
        let mut runtime = RuntimeBuilder::new()
            .with_no_logging()
            .build_and_start()
            .await
            .expect("Failed to build runtime");

        assert!(runtime.is_running());
        runtime
            .send_command(Command::StopScanning)
            .await
            .expect("Failed to send command");

        runtime.shutdown().await.expect("Failed to shutdown");
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn test_invalid_channel_config_is_rejected() {
        let config = ChannelConfig {
            command_buffer_size: 0,
            ..ChannelConfig::default()
        };
        let result = RuntimeBuilder::new()
            .with_channel_config(config)
            .build_and_start()
            .await;
        assert!(matches!(result, Err(BluetuneError::Configuration { .. })));
    }

    #[tokio::test]
    async fn test_app_event_receiver_taken_once() {
        let mut runtime = create_test_runtime(Vec::new())
            .await
            .expect("Failed to create runtime");

        let mut app_events = runtime
            .take_app_event_receiver()
            .expect("Failed to get app event receiver");
        assert!(runtime.take_app_event_receiver().is_none());

        // Adapter state is unknown, so scanning is refused with an error event
        runtime.start_scanning().await.unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), app_events.recv())
            .await
            .expect("no app event")
            .expect("channel closed");
        assert!(matches!(event, bluetune_core::AppEvent::SessionError { .. }));

        runtime.shutdown().await.expect("Failed to shutdown");
    }
}
