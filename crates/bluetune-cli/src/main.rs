//! bluetune - connect to a Bluetooth LE device and play a clip

use clap::Parser;
use tracing::{error, info};

use bluetune_cli::{
    app::{AppOptions, BluetuneApp},
    cli::{Cli, Commands},
    commands::CommandDispatcher,
    config::AppConfig,
    error::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if cli.command == Commands::ExampleConfig {
        println!("{}", AppConfig::example_config());
        return Ok(());
    }

    let config = match load_configuration(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    let options = AppOptions {
        simulate: cli.simulate,
        no_audio: cli.no_audio,
        verbose: cli.verbose,
    };
    let app = match BluetuneApp::start(config, options).await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to start session: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = CommandDispatcher::execute(cli.command, app).await {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("bluetune exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Defaults, then the config file, then command line flags
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;

    if let Some(clip) = &cli.clip {
        config.audio.clip_path = clip.clone();
    }
    config.validate()?;
    Ok(config)
}
