//! Terminal Interface Implementation
//!
//! Line-oriented console over the session: stdin lines become commands, app
//! events are printed as they arrive.

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use bluetune_core::{internal::AppEventReceiver, AppEvent, ConnectionStatus, SessionSnapshot};

use crate::app::BluetuneApp;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Console Commands
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Scan,
    StopScan,
    List,
    Connect(String),
    Disconnect,
    Play,
    StopAudio,
    Status,
    /// Simulated radio only
    DropLink,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> std::result::Result<ConsoleCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "scan" => ConsoleCommand::Scan,
        "stop" => ConsoleCommand::StopScan,
        "list" | "ls" => ConsoleCommand::List,
        "connect" | "c" => {
            if rest.is_empty() {
                return Err("usage: connect <number|id|name>".to_string());
            }
            ConsoleCommand::Connect(rest.to_string())
        }
        "disconnect" | "d" => ConsoleCommand::Disconnect,
        "play" => ConsoleCommand::Play,
        "stop-audio" | "pause" => ConsoleCommand::StopAudio,
        "status" => ConsoleCommand::Status,
        "drop" => ConsoleCommand::DropLink,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(command)
}

const HELP: &str = "\
Commands:
  scan                      start scanning
  stop                      stop scanning
  list                      show discovered devices
  connect <n|id|name>       connect to a device
  disconnect                close the connection
  play                      play the clip on the connected device
  stop-audio                stop playback
  status                    show session status
  drop                      drop the link (simulated radio only)
  quit                      exit";

// ----------------------------------------------------------------------------
// Rendering
// ----------------------------------------------------------------------------

/// One line describing an app event, or `None` for events the console skips
pub fn format_app_event(event: &AppEvent) -> Option<String> {
    let line = match event {
        AppEvent::AdapterStateChanged { state } => format!("Adapter: {}", state),
        AppEvent::ScanningChanged { active: true } => "Scanning...".to_string(),
        AppEvent::ScanningChanged { active: false } => "Scan stopped".to_string(),
        AppEvent::DeviceListCleared => return None,
        AppEvent::DeviceDiscovered { device } => match device.rssi {
            Some(rssi) => format!("Found {} [{}] {} dBm", device.display_name(), device.id, rssi),
            None => format!("Found {} [{}]", device.display_name(), device.id),
        },
        AppEvent::ConnectionChanged { status, device } => match device {
            Some(device) => format!("{} {}", status, device),
            None => status.to_string(),
        },
        AppEvent::PlaybackChanged { playing: true } => "Playing".to_string(),
        AppEvent::PlaybackChanged { playing: false } => "Playback stopped".to_string(),
        AppEvent::AudioReadinessChanged { ready } => {
            format!("Audio {}", if *ready { "ready" } else { "unavailable" })
        }
        AppEvent::ServicesDiscovered { services, .. } => {
            format!("{} GATT services", services.len())
        }
        AppEvent::CharacteristicsDiscovered {
            service,
            characteristics,
            ..
        } => format!("  service {}: {} characteristics", service, characteristics.len()),
        AppEvent::SessionError { error } => format!("Error: {}", error),
        AppEvent::Snapshot { .. } => return None,
    };
    Some(line)
}

pub fn format_device_list(snapshot: &SessionSnapshot) -> String {
    if snapshot.devices.is_empty() {
        return "No devices discovered".to_string();
    }
    let connected = snapshot.connection.device().map(|d| &d.id);
    snapshot
        .devices
        .iter()
        .enumerate()
        .map(|(i, device)| {
            let marker = if Some(&device.id) == connected { "*" } else { " " };
            let rssi = device
                .rssi
                .map(|r| format!(" {} dBm", r))
                .unwrap_or_default();
            format!("{}{:>2}. {} [{}]{}", marker, i + 1, device.display_name(), device.id, rssi)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_status(snapshot: &SessionSnapshot) -> String {
    let connection = match snapshot.connection.device() {
        Some(device) => format!("{} {}", snapshot.connection.status(), device),
        None => snapshot.connection.status().to_string(),
    };
    let mut lines = vec![
        format!("Adapter:    {}", snapshot.adapter_state),
        format!("Scanning:   {}", snapshot.is_scanning),
        format!("Devices:    {}", snapshot.devices.len()),
        format!("Connection: {}", connection),
        format!(
            "Audio:      {}{}",
            if snapshot.is_audio_ready { "ready" } else { "not ready" },
            if snapshot.is_playing { ", playing" } else { "" }
        ),
    ];
    if let Some(error) = &snapshot.last_error {
        lines.push(format!("Last error: {}", error));
    }
    lines.join("\n")
}

// ----------------------------------------------------------------------------
// Terminal Interface
// ----------------------------------------------------------------------------

pub struct TerminalInterface {
    app: BluetuneApp,
    app_events: AppEventReceiver,
}

impl TerminalInterface {
    pub fn new(mut app: BluetuneApp) -> Result<Self> {
        let app_events = app.take_app_events().ok_or(CliError::SessionClosed)?;
        Ok(Self { app, app_events })
    }

    /// Run until `quit`, end of input or Ctrl+C, then shut the session down
    pub async fn run(mut self) -> Result<()> {
        let prompt = self.app.config().cli.prompt.clone();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        println!("bluetune interactive console, type 'help' for commands");
        print_prompt(&prompt);

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("stdin closed");
                        break;
                    };
                    if line.trim().is_empty() {
                        print_prompt(&prompt);
                        continue;
                    }
                    match parse_command(&line) {
                        Ok(ConsoleCommand::Quit) => break,
                        Ok(command) => self.execute(command).await?,
                        Err(message) => println!("{}", message),
                    }
                    print_prompt(&prompt);
                }

                event = self.app_events.recv() => {
                    let Some(event) = event else {
                        warn!("Session stopped");
                        break;
                    };
                    if let Some(line) = format_app_event(&event) {
                        println!("\r{}", line);
                        print_prompt(&prompt);
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    println!();
                    break;
                }
            }
        }

        self.app.shutdown().await
    }

    async fn execute(&self, command: ConsoleCommand) -> Result<()> {
        let runtime = self.app.runtime();
        match command {
            ConsoleCommand::Scan => runtime.start_scanning().await?,
            ConsoleCommand::StopScan => runtime.stop_scanning().await?,
            ConsoleCommand::List => println!("{}", format_device_list(&self.app.snapshot())),
            ConsoleCommand::Connect(query) => match self.app.resolve_device(&query) {
                Ok(device) => runtime.connect(device.id).await?,
                Err(e) => println!("{}", e),
            },
            ConsoleCommand::Disconnect => {
                if self.app.snapshot().connection.status() == ConnectionStatus::Disconnected {
                    println!("Not connected");
                } else {
                    runtime.disconnect().await?;
                }
            }
            ConsoleCommand::Play => runtime.play_audio().await?,
            ConsoleCommand::StopAudio => runtime.stop_audio().await?,
            ConsoleCommand::Status => println!("{}", format_status(&self.app.snapshot())),
            ConsoleCommand::DropLink => match self.app.simulator() {
                Some(simulator) => {
                    if let Err(e) = simulator.drop_link("dropped from console") {
                        println!("{}", e);
                    }
                }
                None => println!("'drop' needs --simulate"),
            },
            ConsoleCommand::Help => println!("{}", HELP),
            ConsoleCommand::Quit => {}
        }
        Ok(())
    }
}

fn print_prompt(prompt: &str) {
    use std::io::Write;

    print!("{}", prompt);
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluetune_core::{ConnectionState, Device, PowerState, SessionError};

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("scan"), Ok(ConsoleCommand::Scan));
        assert_eq!(parse_command("  LIST "), Ok(ConsoleCommand::List));
        assert_eq!(
            parse_command("connect Kitchen Speaker"),
            Ok(ConsoleCommand::Connect("Kitchen Speaker".to_string()))
        );
        assert_eq!(parse_command("q"), Ok(ConsoleCommand::Quit));
        assert!(parse_command("connect").is_err());
        assert!(parse_command("dance").is_err());
    }

    #[test]
    fn test_format_app_event() {
        let device = Device::new("AA:01", Some("Speaker".to_string())).with_rssi(-50);
        assert_eq!(
            format_app_event(&AppEvent::DeviceDiscovered { device }).as_deref(),
            Some("Found Speaker [AA:01] -50 dBm")
        );
        assert_eq!(format_app_event(&AppEvent::DeviceListCleared), None);

        let line = format_app_event(&AppEvent::SessionError {
            error: SessionError::AdapterUnavailable,
        })
        .unwrap();
        assert!(line.starts_with("Error: "));
    }

    #[test]
    fn test_device_list_marks_connected() {
        let speaker = Device::new("AA:01", Some("Speaker".to_string()));
        let snapshot = SessionSnapshot {
            devices: vec![speaker.clone(), Device::new("AA:02", None)],
            connection: ConnectionState::Connected(speaker),
            adapter_state: PowerState::PoweredOn,
            ..SessionSnapshot::default()
        };
        let list = format_device_list(&snapshot);
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("* 1. Speaker"));
        assert!(lines[1].contains("Unknown Device"));

        let status = format_status(&snapshot);
        assert!(status.contains("Connected"));
        assert!(!status.contains("Last error"));
    }
}
