//! Ciencia CLI
//!
//! Command-line interface for managing projects and pipelines and for
//! launching and following pipeline runs on the orchestrator.

mod commands;
mod config;
mod id_resolver;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "ciencia")]
#[command(about = "Ciencia workflow pipeline CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "CIENCIA_URL", default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.url,
    };

    handle_command(cli.command, &config).await
}
