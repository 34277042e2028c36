//! Session Logic Task Implementation
//!
//! Owns the `SessionManager` and serializes every command and event through a
//! single `select!` loop, so no two handlers ever observe the session at once.

use bluetune_core::{
    internal::{
        AppEventSender, ChannelError, ChannelStats, CommandReceiver, EffectSender,
        EventReceiver, LogLevel, NonBlockingSend, SnapshotSender,
    },
    AppEvent, BluetuneError, BluetuneResult, Command, Effect, Event, SessionConfig,
    SessionSnapshot,
};
use tracing::{debug, error, info, warn};

use super::handlers::{Outcome, SessionManager};
use super::state::{LoggerWrapper, SessionStats};

// ----------------------------------------------------------------------------
// Session Logic Task
// ----------------------------------------------------------------------------

/// The task that processes all commands and events
pub struct SessionLogicTask {
    manager: SessionManager,
    /// User intents from presentation
    command_receiver: CommandReceiver,
    /// Outcomes from the capability tasks
    event_receiver: EventReceiver,
    /// Side-effect requests for the capability tasks
    effect_sender: EffectSender,
    /// Notifications for presentation
    app_event_sender: AppEventSender,
    /// Latest session view
    snapshot_sender: SnapshotSender,
    logger: LoggerWrapper,
    running: bool,
}

impl SessionLogicTask {
    pub fn new(
        config: SessionConfig,
        command_receiver: CommandReceiver,
        event_receiver: EventReceiver,
        effect_sender: EffectSender,
        app_event_sender: AppEventSender,
        snapshot_sender: SnapshotSender,
        logger: LoggerWrapper,
    ) -> Self {
        Self {
            manager: SessionManager::new(config),
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            snapshot_sender,
            logger,
            running: true,
        }
    }

    /// Run the session loop until shutdown or the command channel closes
    pub async fn run(&mut self) -> BluetuneResult<()> {
        self.logger
            .log_task_event(LogLevel::Info, "Session logic task starting");
        self.publish_snapshot();

        let mut events_open = true;

        while self.running {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    match command {
                        Some(cmd) => {
                            self.logger.log_receive_command(&cmd);
                            if let Err(e) = self.process_command(cmd) {
                                if e.is_unrecoverable() {
                                    error!("Unrecoverable error processing command, shutting down: {}", e);
                                    self.running = false;
                                    break;
                                }
                                warn!("Error processing command: {}", e);
                            }
                        }
                        None => {
                            info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }

                event = self.event_receiver.recv(), if events_open => {
                    match event {
                        Some(evt) => {
                            self.logger.log_receive_event(&evt);
                            if let Err(e) = self.process_event(evt) {
                                if e.is_unrecoverable() {
                                    error!("Unrecoverable error processing event, shutting down: {}", e);
                                    self.running = false;
                                    break;
                                }
                                warn!("Error processing event: {}", e);
                            }
                        }
                        None => {
                            // Keep serving commands; capability tasks may all have exited
                            info!("Event channel closed");
                            events_open = false;
                        }
                    }
                }
            }
        }

        self.logger
            .log_task_event(LogLevel::Info, "Session logic task stopped");
        Ok(())
    }

    pub fn stats(&self) -> &SessionStats {
        &self.manager.state().stats
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.manager.snapshot()
    }

    fn process_command(&mut self, command: Command) -> BluetuneResult<()> {
        if command == Command::Shutdown {
            info!("Shutdown requested");
            self.running = false;
        }
        let outcome = self.manager.handle_command(&command);
        self.dispatch(outcome)
    }

    fn process_event(&mut self, event: Event) -> BluetuneResult<()> {
        let outcome = self.manager.handle_event(event);
        self.dispatch(outcome)
    }

    /// Fan out effects, publish the new snapshot, then notify presentation
    ///
    /// The snapshot goes out before app events so it stays current even when
    /// presentation has gone away.
    fn dispatch(&mut self, outcome: Outcome) -> BluetuneResult<()> {
        for effect in outcome.effects {
            self.send_effect(effect);
        }
        self.publish_snapshot();
        for app_event in outcome.app_events {
            self.send_app_event(app_event)?;
        }
        Ok(())
    }

    fn send_effect(&mut self, effect: Effect) {
        self.logger.log_send_effect(&effect);
        match self.effect_sender.send(effect) {
            Ok(receivers) => {
                debug!("Effect delivered to {} receivers", receivers);
                self.manager.state_mut().stats.effects_generated += 1;
            }
            // No capability task attached; the session still advances
            Err(e) => warn!("No task listening for effect {:?}", e.0),
        }
    }

    /// Presentation is never awaited; a full buffer drops the notification
    fn send_app_event(&mut self, app_event: AppEvent) -> BluetuneResult<()> {
        let utilization = ChannelStats::of(&self.app_event_sender).utilization();
        self.logger.log_send_app_event(&app_event, Some(utilization));

        match self.app_event_sender.try_send_non_blocking(app_event.clone()) {
            Ok(()) => {
                self.manager.state_mut().stats.app_events_generated += 1;
                Ok(())
            }
            Err(ChannelError::ChannelFull) => {
                self.logger.log_drop_app_event(&app_event, "channel full");
                Ok(())
            }
            Err(ChannelError::ChannelClosed) => {
                self.logger.log_drop_app_event(&app_event, "channel closed");
                Err(BluetuneError::channel("App event channel closed"))
            }
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = self.manager.snapshot();
        self.snapshot_sender.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluetune_core::{
        internal::{
            create_app_event_channel, create_command_channel, create_effect_channel,
            create_event_channel, create_snapshot_channel, NoOpLogger,
        },
        ChannelConfig, Device, DeviceId, PowerState,
    };
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_command_stops_loop() {
        let config = ChannelConfig::testing();
        let (command_sender, command_receiver) = create_command_channel(&config);
        let (_event_sender, event_receiver) = create_event_channel(&config);
        let (effect_sender, _effect_receiver) = create_effect_channel(&config);
        let (app_event_sender, _app_event_receiver) = create_app_event_channel(&config);
        let (snapshot_sender, _snapshot_receiver) = create_snapshot_channel();

        let mut task = SessionLogicTask::new(
            SessionConfig::default(),
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            snapshot_sender,
            LoggerWrapper::NoOp(NoOpLogger),
        );

        command_sender.send(Command::Shutdown).await.unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), task.run())
            .await
            .expect("task did not stop");
        assert!(result.is_ok());
        assert_eq!(task.stats().commands_processed, 1);
    }

    #[tokio::test]
    async fn test_events_update_published_snapshot() {
        let config = ChannelConfig::testing();
        let (command_sender, command_receiver) = create_command_channel(&config);
        let (event_sender, event_receiver) = create_event_channel(&config);
        let (effect_sender, _effect_receiver) = create_effect_channel(&config);
        let (app_event_sender, _app_event_receiver) = create_app_event_channel(&config);
        let (snapshot_sender, mut snapshot_receiver) = create_snapshot_channel();

        let mut task = SessionLogicTask::new(
            SessionConfig::default(),
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            snapshot_sender,
            LoggerWrapper::NoOp(NoOpLogger),
        );
        let handle = tokio::spawn(async move { task.run().await });

        event_sender
            .send(Event::AdapterStateChanged {
                state: PowerState::PoweredOn,
            })
            .await
            .unwrap();
        event_sender
            .send(Event::DeviceDiscovered {
                device: Device::new(DeviceId::new("A"), Some("Speaker".to_string())),
            })
            .await
            .unwrap();

        let snapshot = tokio::time::timeout(
            Duration::from_secs(1),
            snapshot_receiver.wait_for(|s| !s.devices.is_empty()),
        )
        .await
        .expect("snapshot not published")
        .unwrap()
        .clone();
        assert_eq!(snapshot.adapter_state, PowerState::PoweredOn);

        command_sender.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_published_when_presentation_is_gone() {
        let config = ChannelConfig::testing();
        let (_command_sender, command_receiver) = create_command_channel(&config);
        let (event_sender, event_receiver) = create_event_channel(&config);
        let (effect_sender, _effect_receiver) = create_effect_channel(&config);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&config);
        let (snapshot_sender, snapshot_receiver) = create_snapshot_channel();
        drop(app_event_receiver);

        let mut task = SessionLogicTask::new(
            SessionConfig::default(),
            command_receiver,
            event_receiver,
            effect_sender,
            app_event_sender,
            snapshot_sender,
            LoggerWrapper::NoOp(NoOpLogger),
        );

        event_sender
            .send(Event::AdapterStateChanged {
                state: PowerState::PoweredOn,
            })
            .await
            .unwrap();

        // A closed app event channel ends the loop
        let result = tokio::time::timeout(Duration::from_secs(1), task.run())
            .await
            .expect("task did not stop");
        assert!(result.is_ok());
        assert_eq!(snapshot_receiver.borrow().adapter_state, PowerState::PoweredOn);
        assert_eq!(*snapshot_receiver.borrow(), task.snapshot());
    }
}
