//! Command handlers for the bluetune CLI

use std::time::Duration;

use tracing::{info, warn};

use bluetune_core::{internal::AppEventReceiver, AppEvent, ConnectionStatus, SessionError};

use crate::app::BluetuneApp;
use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::terminal_interface::{format_app_event, format_device_list, TerminalInterface};

/// How long to wait for the link to close after Ctrl+C
const DISCONNECT_WAIT: Duration = Duration::from_secs(3);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command; the session is shut down afterwards
    pub async fn execute(command: Commands, mut app: BluetuneApp) -> Result<()> {
        let result = match command {
            Commands::Interactive => return TerminalInterface::new(app)?.run().await,
            Commands::Scan { duration } => Self::handle_scan_command(&mut app, duration).await,
            Commands::Connect { device, timeout } => {
                Self::handle_connect_command(&mut app, &device, timeout).await
            }
            Commands::ExampleConfig => {
                println!("{}", AppConfig::example_config());
                Ok(())
            }
        };

        let shutdown = app.shutdown().await;
        result.and(shutdown)
    }

    /// Scan for a while and list what was found
    async fn handle_scan_command(app: &mut BluetuneApp, duration: Option<u64>) -> Result<()> {
        let secs = duration.unwrap_or(app.config().cli.scan_duration_secs);
        let mut events = app.take_app_events().ok_or(CliError::SessionClosed)?;

        app.wait_for_adapter().await?;
        app.runtime().start_scanning().await?;
        println!("Scanning for {}s... Press Ctrl+C to stop", secs);

        let deadline = tokio::time::sleep(Duration::from_secs(secs));
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => match event {
                    Some(event @ AppEvent::DeviceDiscovered { .. }) => {
                        if let Some(line) = format_app_event(&event) {
                            println!("{}", line);
                        }
                    }
                    Some(AppEvent::SessionError { error }) => {
                        warn!("{}", error);
                        if matches!(error, SessionError::ScanFailed { .. }) {
                            return Err(error.into());
                        }
                    }
                    Some(_) => {}
                    None => return Err(CliError::SessionClosed),
                }
            }
        }

        app.runtime().stop_scanning().await?;
        println!();
        println!("{}", format_device_list(&app.snapshot()));
        Ok(())
    }

    /// Find the device, connect, then stay connected until interrupted
    async fn handle_connect_command(
        app: &mut BluetuneApp,
        query: &str,
        timeout: Option<u64>,
    ) -> Result<()> {
        let limit = Duration::from_secs(timeout.unwrap_or(app.config().cli.connect_timeout_secs));
        let mut events = app.take_app_events().ok_or(CliError::SessionClosed)?;

        app.wait_for_adapter().await?;
        app.runtime().start_scanning().await?;
        info!("Looking for '{}'", query);

        let snapshot = app
            .wait_for(limit, &format!("'{}' to be discovered", query), |s| {
                s.find_device(query).is_some()
            })
            .await?;
        let device = snapshot
            .find_device(query)
            .cloned()
            .ok_or_else(|| CliError::DeviceNotFound {
                query: query.to_string(),
            })?;

        println!("Connecting to {}...", device);
        app.runtime().connect(device.id.clone()).await?;

        match tokio::time::timeout(limit, Self::await_connection(&mut events)).await {
            Ok(result) => result?,
            Err(_) => {
                let _ = app.runtime().disconnect().await;
                return Err(CliError::timeout(format!("connection to {}", device)));
            }
        }

        println!("Connected, press Ctrl+C to disconnect");
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                event = events.recv() => {
                    let Some(event) = event else {
                        return Err(CliError::SessionClosed);
                    };
                    if let Some(line) = format_app_event(&event) {
                        println!("{}", line);
                    }
                    if let AppEvent::ConnectionChanged { status: ConnectionStatus::Disconnected, .. } = event {
                        return Ok(());
                    }
                }
            }
        }

        app.runtime().disconnect().await?;
        if app
            .wait_for(DISCONNECT_WAIT, "the link to close", |s| {
                s.connection.is_disconnected()
            })
            .await
            .is_err()
        {
            warn!("Link did not close in time");
        }
        Ok(())
    }

    /// Print progress until the link comes up or the attempt is refused
    async fn await_connection(events: &mut AppEventReceiver) -> Result<()> {
        while let Some(event) = events.recv().await {
            if let Some(line) = format_app_event(&event) {
                println!("{}", line);
            }
            match event {
                AppEvent::ConnectionChanged {
                    status: ConnectionStatus::Connected,
                    ..
                } => return Ok(()),
                AppEvent::SessionError { error } if is_connect_failure(&error) => {
                    return Err(error.into());
                }
                _ => {}
            }
        }
        Err(CliError::SessionClosed)
    }
}

fn is_connect_failure(error: &SessionError) -> bool {
    matches!(
        error,
        SessionError::AdapterUnavailable
            | SessionError::DeviceNotDiscovered { .. }
            | SessionError::ConnectRejected { .. }
            | SessionError::ConnectionFailed { .. }
    )
}
