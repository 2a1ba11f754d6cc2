//! Project Service
//!
//! Business logic for project management.

use ciencia_core::domain::project::Project;
use ciencia_core::dto::project::CreateProject;
use ciencia_runner::StoreError;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::{PipelineRepository, ProjectRepository};

/// Service error type
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Project {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ProjectError>;

/// Create a new project
pub async fn create_project(
    projects: &dyn ProjectRepository,
    req: CreateProject,
) -> Result<Project> {
    validate_project_request(&req)?;

    let now = chrono::Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        description: req.description.filter(|d| !d.trim().is_empty()),
        created_at: now,
        updated_at: now,
    };

    projects.create(&project).await?;

    tracing::info!("Project created: {} ({})", project.name, project.id);

    Ok(project)
}

/// Get a project by ID
pub async fn get_project(projects: &dyn ProjectRepository, id: Uuid) -> Result<Project> {
    projects
        .find_by_id(id)
        .await?
        .ok_or(ProjectError::NotFound(id))
}

/// List all projects
pub async fn list_projects(projects: &dyn ProjectRepository) -> Result<Vec<Project>> {
    Ok(projects.list_all().await?)
}

/// Delete a project
///
/// Refused while the project still owns pipelines.
pub async fn delete_project(
    projects: &dyn ProjectRepository,
    pipelines: &dyn PipelineRepository,
    id: Uuid,
) -> Result<()> {
    get_project(projects, id).await?;

    let count = pipelines.count_by_project(id).await?;
    if count > 0 {
        return Err(ProjectError::Conflict(format!(
            "Project {} still has {} pipeline(s)",
            id, count
        )));
    }

    if !projects.delete(id).await? {
        return Err(ProjectError::NotFound(id));
    }

    tracing::info!("Project deleted: {}", id);

    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_project_request(req: &CreateProject) -> Result<()> {
    if req.name.trim().is_empty() {
        return Err(ProjectError::Validation(
            "Project name cannot be empty".to_string(),
        ));
    }

    if req.name.len() > 255 {
        return Err(ProjectError::Validation(
            "Project name is too long (max 255 characters)".to_string(),
        ));
    }

    Ok(())
}
