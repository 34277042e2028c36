//! Application wiring: picks the capability tasks and owns the runtime handle

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info};

use bluetune_audio::{AudioTask, RodioEngine, SilentEngine};
use bluetune_ble::{demo_peripherals, BleAdapterTask, SimulatedAdapterTask, SimulatorControl};
use bluetune_core::{
    internal::{AppEventReceiver, LogLevel},
    Device, SessionSnapshot, SessionTask,
};
use bluetune_runtime::{RuntimeBuilder, RuntimeHandle};

use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// Which capability implementations to start
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppOptions {
    /// Simulated radio instead of the host adapter
    pub simulate: bool,
    /// Silent engine instead of the default output device
    pub no_audio: bool,
    /// Trace every channel message
    pub verbose: bool,
}

/// A running session plus the handles the front end needs
pub struct BluetuneApp {
    config: AppConfig,
    runtime: RuntimeHandle,
    app_events: Option<AppEventReceiver>,
    simulator: Option<SimulatorControl>,
}

impl BluetuneApp {
    /// Start the session with the tasks selected by `options`
    pub async fn start(config: AppConfig, options: AppOptions) -> Result<Self> {
        let mut tasks: Vec<Box<dyn SessionTask>> = Vec::with_capacity(2);
        let mut simulator = None;

        if options.simulate {
            info!("Using simulated Bluetooth radio");
            let task = SimulatedAdapterTask::new(demo_peripherals());
            simulator = Some(task.control());
            tasks.push(Box::new(task));
        } else {
            tasks.push(Box::new(BleAdapterTask::new(config.ble.clone())));
        }

        if options.no_audio {
            info!("Audio output disabled");
            tasks.push(Box::new(AudioTask::new(config.audio.clone(), SilentEngine::new())));
        } else {
            let engine = RodioEngine::new().with_volume(config.audio.volume);
            tasks.push(Box::new(AudioTask::new(config.audio.clone(), engine)));
        }

        let level = if options.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        };
        Self::with_tasks(config, tasks, level, simulator).await
    }

    /// Start the session with caller-supplied tasks
    pub async fn with_tasks(
        config: AppConfig,
        tasks: Vec<Box<dyn SessionTask>>,
        level: LogLevel,
        simulator: Option<SimulatorControl>,
    ) -> Result<Self> {
        let builder = RuntimeBuilder::new()
            .with_config(config.session.clone())
            .with_channel_config(config.channels.clone())
            .with_tracing_logging(level);
        let mut runtime = tasks
            .into_iter()
            .fold(builder, |builder, task| builder.add_task(task))
            .build_and_start()
            .await?;
        let app_events = runtime.take_app_event_receiver();

        Ok(Self {
            config,
            runtime,
            app_events,
            simulator,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn runtime(&self) -> &RuntimeHandle {
        &self.runtime
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.runtime.snapshot()
    }

    /// Control handle of the simulated radio, when one is running
    pub fn simulator(&self) -> Option<&SimulatorControl> {
        self.simulator.as_ref()
    }

    /// Hand the app event stream to a single consumer
    pub fn take_app_events(&mut self) -> Option<AppEventReceiver> {
        self.app_events.take()
    }

    /// Wait until the session snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        limit: Duration,
        what: &str,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot> {
        let mut snapshots = self.runtime.subscribe();
        let result = match timeout(limit, snapshots.wait_for(predicate)).await {
            Ok(Ok(snapshot)) => Ok(snapshot.clone()),
            Ok(Err(_)) => Err(CliError::SessionClosed),
            Err(_) => Err(CliError::timeout(what)),
        };
        result
    }

    /// Block until the adapter reports powered on
    pub async fn wait_for_adapter(&self) -> Result<()> {
        let limit = Duration::from_secs(self.config.cli.adapter_wait_secs);
        self.wait_for(limit, "the Bluetooth adapter to power on", |s| {
            s.adapter_state.is_powered_on()
        })
        .await?;
        debug!("Adapter powered on");
        Ok(())
    }

    /// Resolve a console or command-line device reference
    ///
    /// Accepts a 1-based index into the discovered list, a device id or an
    /// advertised name.
    pub fn resolve_device(&self, query: &str) -> Result<Device> {
        resolve_device(&self.runtime.snapshot(), query)
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.runtime.shutdown().await?;
        Ok(())
    }
}

pub fn resolve_device(snapshot: &SessionSnapshot, query: &str) -> Result<Device> {
    let query = query.trim();
    let by_index = query
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| snapshot.devices.get(i));

    by_index
        .or_else(|| snapshot.find_device(query))
        .cloned()
        .ok_or_else(|| CliError::DeviceNotFound {
            query: query.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            devices: vec![
                Device::new("AA:01", Some("Speaker".to_string())),
                Device::new("AA:02", None),
            ],
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn test_resolve_by_index_id_and_name() {
        let snapshot = snapshot();
        assert_eq!(resolve_device(&snapshot, "1").unwrap().id.as_str(), "AA:01");
        assert_eq!(resolve_device(&snapshot, "AA:02").unwrap().id.as_str(), "AA:02");
        assert_eq!(resolve_device(&snapshot, " Speaker ").unwrap().id.as_str(), "AA:01");
    }

    #[test]
    fn test_resolve_unknown() {
        let snapshot = snapshot();
        assert!(matches!(
            resolve_device(&snapshot, "0"),
            Err(CliError::DeviceNotFound { .. })
        ));
        assert!(matches!(
            resolve_device(&snapshot, "Headset"),
            Err(CliError::DeviceNotFound { .. })
        ));
    }
}
