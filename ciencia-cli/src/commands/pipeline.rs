//! Pipeline command handlers
//!
//! Handles pipeline creation from a workflow script file, listing, viewing,
//! updating and deletion, plus the run history of a pipeline.

use anyhow::{Context, Result};
use ciencia_client::CienciaClient;
use ciencia_core::domain::pipeline::{Pipeline, PipelineStatus};
use ciencia_core::dto::pipeline::{CreatePipeline, PipelineSummary, UpdatePipeline};
use clap::Subcommand;
use colored::*;

use super::run::print_run_summary;
use crate::config::Config;
use crate::id_resolver::{resolve_pipeline_id, resolve_project_id};
use crate::types::IdOrPrefix;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Create a pipeline from a workflow script
    Create {
        /// Owning project ID or unambiguous prefix
        #[arg(short, long)]
        project: String,

        #[arg(short, long)]
        name: String,

        /// Path to the workflow script
        #[arg(short, long)]
        file: String,
    },
    /// List pipelines, optionally within one project
    List {
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Get pipeline details including its script
    Get {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// Update a pipeline's name, script or status
    Update {
        /// Pipeline ID or unambiguous prefix
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        /// Path to a replacement workflow script
        #[arg(short, long)]
        file: Option<String>,

        /// One of draft, validated, running, completed, failed
        #[arg(short, long, value_parser = parse_status)]
        status: Option<PipelineStatus>,
    },
    /// Delete a pipeline and its run history
    Delete {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
    /// List the runs of a pipeline, newest first
    Runs {
        /// Pipeline ID or unambiguous prefix
        id: String,
    },
}

fn parse_status(s: &str) -> std::result::Result<PipelineStatus, String> {
    s.parse()
}

pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        PipelineCommands::Create {
            project,
            name,
            file,
        } => create_pipeline(&client, &project, name, &file).await,
        PipelineCommands::List { project } => list_pipelines(&client, project.as_deref()).await,
        PipelineCommands::Get { id } => get_pipeline(&client, &id).await,
        PipelineCommands::Update {
            id,
            name,
            file,
            status,
        } => update_pipeline(&client, &id, name, file.as_deref(), status).await,
        PipelineCommands::Delete { id } => delete_pipeline(&client, &id).await,
        PipelineCommands::Runs { id } => list_runs(&client, &id).await,
    }
}

fn read_script(path: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read script file: {}", path))
}

async fn create_pipeline(
    client: &CienciaClient,
    project: &str,
    name: String,
    script_path: &str,
) -> Result<()> {
    let script = read_script(script_path)?;
    let project_id = resolve_project_id(client, &IdOrPrefix::parse(project)).await?;

    let pipeline = client
        .create_pipeline(CreatePipeline {
            project_id,
            name,
            script,
        })
        .await?;

    println!("{}", "✓ Pipeline created successfully!".green().bold());
    println!("  ID:      {}", pipeline.id.to_string().cyan());
    println!("  Name:    {}", pipeline.name.bold());
    println!("  Project: {}", pipeline.project_id.to_string().dimmed());

    Ok(())
}

async fn list_pipelines(client: &CienciaClient, project: Option<&str>) -> Result<()> {
    let project_id = match project {
        Some(project) => Some(resolve_project_id(client, &IdOrPrefix::parse(project)).await?),
        None => None,
    };
    let pipelines = client.list_pipelines(project_id).await?;

    if pipelines.is_empty() {
        println!("{}", "No pipelines found.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} pipeline(s):", pipelines.len()).bold()
        );
        println!();
        for pipeline in pipelines {
            print_pipeline_summary(&pipeline);
        }
    }

    Ok(())
}

async fn get_pipeline(client: &CienciaClient, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, &IdOrPrefix::parse(id)).await?;
    let pipeline = client.get_pipeline(uuid).await?;

    print_pipeline_details(&pipeline);

    Ok(())
}

async fn update_pipeline(
    client: &CienciaClient,
    id: &str,
    name: Option<String>,
    script_path: Option<&str>,
    status: Option<PipelineStatus>,
) -> Result<()> {
    let script = script_path.map(read_script).transpose()?;
    if name.is_none() && script.is_none() && status.is_none() {
        anyhow::bail!("Nothing to update: pass --name, --file or --status");
    }

    let uuid = resolve_pipeline_id(client, &IdOrPrefix::parse(id)).await?;
    let pipeline = client
        .update_pipeline(
            uuid,
            UpdatePipeline {
                name,
                script,
                status,
            },
        )
        .await?;

    println!("{}", "✓ Pipeline updated successfully!".green().bold());
    println!("  ID:     {}", pipeline.id.to_string().cyan());
    println!("  Name:   {}", pipeline.name.bold());
    println!("  Status: {}", pipeline.status);

    Ok(())
}

async fn delete_pipeline(client: &CienciaClient, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, &IdOrPrefix::parse(id)).await?;

    client.delete_pipeline(uuid).await?;

    println!(
        "{}",
        format!("✓ Pipeline {} deleted successfully!", uuid)
            .green()
            .bold()
    );

    Ok(())
}

async fn list_runs(client: &CienciaClient, id: &str) -> Result<()> {
    let uuid = resolve_pipeline_id(client, &IdOrPrefix::parse(id)).await?;
    let runs = client.list_pipeline_runs(uuid).await?;

    if runs.is_empty() {
        println!(
            "{}",
            format!("No runs found for pipeline {}.", uuid).yellow()
        );
    } else {
        println!(
            "{}",
            format!("Found {} run(s) for pipeline {}:", runs.len(), uuid).bold()
        );
        println!();
        for run in &runs {
            print_run_summary(run);
        }
    }

    Ok(())
}

fn print_pipeline_summary(pipeline: &PipelineSummary) {
    println!("  {} {}", "▸".cyan(), pipeline.name.bold());
    println!("    ID:      {}", pipeline.id.to_string().dimmed());
    println!("    Project: {}", pipeline.project_id.to_string().dimmed());
    println!("    Status:  {}", pipeline.status.as_str().dimmed());
    println!(
        "    Updated: {}",
        pipeline
            .updated_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

fn print_pipeline_details(pipeline: &Pipeline) {
    println!("{}", "Pipeline Details:".bold());
    println!("  ID:      {}", pipeline.id.to_string().cyan());
    println!("  Name:    {}", pipeline.name.bold());
    println!("  Project: {}", pipeline.project_id);
    println!("  Status:  {}", pipeline.status);
    println!(
        "  Created: {}",
        pipeline.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Updated: {}",
        pipeline.updated_at.format("%Y-%m-%d %H:%M:%S")
    );

    println!("\n{}", "Script:".bold());
    println!("{}", "─".repeat(80).dimmed());
    println!("{}", pipeline.script);
    println!("{}", "─".repeat(80).dimmed());
}
