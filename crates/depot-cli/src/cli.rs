use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Named file storage over HTTP", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "DEPOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Directory blobs are stored in
        #[arg(long)]
        storage_folder: Option<PathBuf>,
    },

    /// Compare stored blobs against metadata records
    Reconcile {
        /// Remove temporary files left by interrupted uploads
        #[arg(long)]
        prune_partials: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the default config file path
    Path,

    /// Print the effective configuration
    Show,
}
