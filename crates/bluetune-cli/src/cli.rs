//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use a simulated radio with a few demo devices instead of the host adapter
    #[arg(long, global = true)]
    pub simulate: bool,

    /// Do not open an audio output device
    #[arg(long, global = true)]
    pub no_audio: bool,

    /// Audio clip to play on connect
    #[arg(long, global = true)]
    pub clip: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Scan for nearby devices and list them
    Scan {
        /// Seconds to scan for
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Connect to a device by id or name and play the clip until interrupted
    Connect {
        /// Device id or advertised name
        device: String,
        /// Seconds to wait for the device to appear and accept the connection
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Start the interactive console
    Interactive,
    /// Print an example configuration file
    ExampleConfig,
}
