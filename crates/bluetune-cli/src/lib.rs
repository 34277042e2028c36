//! bluetune CLI library
//!
//! Front end for the bluetune session: argument parsing, configuration,
//! wiring of the capability tasks and the interactive console.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod terminal_interface;

pub use app::{AppOptions, BluetuneApp};
pub use cli::{Cli, Commands};
pub use config::{AppConfig, ConfigError};
pub use error::{CliError, Result};
