mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use depot_core::LevelControl;
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;
    let levels = Arc::new(logging::init(&config.logging)?);
    debug!(levels = ?levels.levels(), "Logging initialised");

    match cli.command {
        cli::Commands::Serve {
            host,
            port,
            storage_folder,
        } => commands::serve::handle(config, host, port, storage_folder, levels).await,
        cli::Commands::Reconcile {
            prune_partials,
            json,
        } => commands::reconcile::handle(&config, prune_partials, json).await,
        cli::Commands::Config(cmd) => commands::config::handle(cmd, &config),
    }
}
