//! Project command handlers

use anyhow::Result;
use ciencia_client::CienciaClient;
use ciencia_core::domain::project::Project;
use ciencia_core::dto::project::CreateProject;
use clap::Subcommand;
use colored::*;

use crate::config::Config;
use crate::id_resolver::resolve_project_id;
use crate::types::IdOrPrefix;

/// Project subcommands
#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a new project
    Create {
        /// Project name
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: Option<String>,
    },
    /// List all projects
    List,
    /// Get project details
    Get {
        /// Project ID or unambiguous prefix
        id: String,
    },
    /// Delete a project that no longer owns pipelines
    Delete {
        /// Project ID or unambiguous prefix
        id: String,
    },
}

pub async fn handle_project_command(command: ProjectCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        ProjectCommands::Create { name, description } => {
            create_project(&client, name, description).await
        }
        ProjectCommands::List => list_projects(&client).await,
        ProjectCommands::Get { id } => get_project(&client, &id).await,
        ProjectCommands::Delete { id } => delete_project(&client, &id).await,
    }
}

async fn create_project(
    client: &CienciaClient,
    name: String,
    description: Option<String>,
) -> Result<()> {
    let project = client
        .create_project(CreateProject { name, description })
        .await?;

    println!("{}", "✓ Project created successfully!".green().bold());
    println!("  ID:   {}", project.id.to_string().cyan());
    println!("  Name: {}", project.name.bold());

    Ok(())
}

async fn list_projects(client: &CienciaClient) -> Result<()> {
    let projects = client.list_projects().await?;

    if projects.is_empty() {
        println!("{}", "No projects found.".yellow());
        return Ok(());
    }

    println!("{}", format!("Found {} project(s):", projects.len()).bold());
    println!();
    for project in &projects {
        println!("  {} {}", "▸".cyan(), project.name.bold());
        println!("    ID:      {}", project.id.to_string().dimmed());
        if let Some(desc) = &project.description {
            println!("    Description: {}", desc.dimmed());
        }
        println!();
    }

    Ok(())
}

async fn get_project(client: &CienciaClient, id: &str) -> Result<()> {
    let uuid = resolve_project_id(client, &IdOrPrefix::parse(id)).await?;
    let project = client.get_project(uuid).await?;
    let pipelines = client.list_pipelines(Some(uuid)).await?;

    print_project_details(&project);
    if !pipelines.is_empty() {
        println!("\n{}", "Pipelines:".bold());
        for pipeline in pipelines {
            println!(
                "  {} {} {}",
                "▸".cyan(),
                pipeline.name,
                format!("({}, {})", pipeline.id, pipeline.status).dimmed()
            );
        }
    }

    Ok(())
}

async fn delete_project(client: &CienciaClient, id: &str) -> Result<()> {
    let uuid = resolve_project_id(client, &IdOrPrefix::parse(id)).await?;

    client.delete_project(uuid).await?;

    println!(
        "{}",
        format!("✓ Project {} deleted successfully!", uuid)
            .green()
            .bold()
    );
    Ok(())
}

fn print_project_details(project: &Project) {
    println!("{}", "Project Details:".bold());
    println!("  ID:          {}", project.id.to_string().cyan());
    println!("  Name:        {}", project.name.bold());
    if let Some(desc) = &project.description {
        println!("  Description: {}", desc);
    }
    println!(
        "  Created:     {}",
        project.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}
