//! Tally - Main Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use tally::{clock_at, load_events, App, Cli};
use tally_common::init_logging;
use tally_config::ConfigLoader;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.logging.level.clone_from(level);
    }
    init_logging(&config.logging).context("Failed to initialize logging")?;

    info!("Starting Tally v{}", env!("CARGO_PKG_VERSION"));

    let repository = load_events(&cli.events)?;
    let app = App::with_clock(&config, repository, clock_at(cli.now))?;
    let report = app.run(&cli.command).await?;

    println!("{}", report.to_json()?);

    if !report.is_complete() {
        error!("Some metrics could not be loaded");
        std::process::exit(1);
    }
    Ok(())
}
