//! Vigil CLI
//!
//! Command-line entry point for the change detection service.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;
use vigil::{load_config, Config};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "HTTP change detection and notification service")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// State file path (overrides the config file setting)
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: Level,

    /// Check a single url once, print the outcome and exit
    #[arg(long, value_name = "URL")]
    probe: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    if let Some(url) = &args.probe {
        vigil::item::validate_url(url)?;
        let result = vigil::checker::probe(url).await?;
        match result.status_code {
            Some(code) => println!(
                "{} -> HTTP {} ({}), {} bytes in {} ms",
                url,
                code,
                result.status(),
                result.byte_size,
                result.duration_ms
            ),
            None => println!(
                "{} -> {}: {}",
                url,
                result.status(),
                result.error.unwrap_or_default()
            ),
        }
        return Ok(());
    }

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(state_file) = args.state_file {
        config.engine.state_file = state_file;
    }

    tracing::info!("Starting vigil service");
    tracing::debug!(
        "Items: {}, Notifiers: {}",
        config.items.len(),
        config.notifiers.len()
    );

    vigil::run(config).await?;

    Ok(())
}
