//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod pipeline;
mod project;
mod run;

pub use pipeline::PipelineCommands;
pub use project::ProjectCommands;
pub use run::RunCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Launch, follow and cancel pipeline runs
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Check that the orchestrator is reachable
    Health,
}

/// Routes a command to its handler module
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Project { command } => project::handle_project_command(command, config).await,
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Health => health(config).await,
    }
}

async fn health(config: &Config) -> Result<()> {
    use colored::*;

    let client = config.client();
    let health = client.health().await?;

    println!(
        "{} {}",
        "✓ Orchestrator reachable at".green().bold(),
        client.base_url().cyan()
    );
    println!("{}", serde_json::to_string_pretty(&health)?);
    Ok(())
}
