//! Pipeline Service
//!
//! Business logic for pipeline management.

use ciencia_core::domain::pipeline::Pipeline;
use ciencia_core::dto::pipeline::{CreatePipeline, UpdatePipeline};
use ciencia_runner::StoreError;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::{PipelineDeletion, PipelineRepository, ProjectRepository};

/// Service error type
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline {0} not found")]
    NotFound(Uuid),

    #[error("Project {0} not found")]
    ProjectNotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Create a new pipeline inside an existing project
pub async fn create_pipeline(
    projects: &dyn ProjectRepository,
    pipelines: &dyn PipelineRepository,
    req: CreatePipeline,
) -> Result<Pipeline> {
    validate_name(&req.name)?;
    validate_script(&req.script)?;

    if projects.find_by_id(req.project_id).await?.is_none() {
        return Err(PipelineError::ProjectNotFound(req.project_id));
    }

    let now = chrono::Utc::now();
    let pipeline = Pipeline {
        id: Uuid::new_v4(),
        project_id: req.project_id,
        name: req.name.trim().to_string(),
        script: req.script,
        status: Default::default(),
        created_at: now,
        updated_at: now,
    };

    pipelines.create(&pipeline).await?;

    tracing::info!("Pipeline created: {} ({})", pipeline.name, pipeline.id);

    Ok(pipeline)
}

/// Get a pipeline by ID
pub async fn get_pipeline(pipelines: &dyn PipelineRepository, id: Uuid) -> Result<Pipeline> {
    pipelines
        .find_by_id(id)
        .await?
        .ok_or(PipelineError::NotFound(id))
}

/// List pipelines, optionally of a single project
pub async fn list_pipelines(
    pipelines: &dyn PipelineRepository,
    project_id: Option<Uuid>,
) -> Result<Vec<Pipeline>> {
    Ok(pipelines.list(project_id).await?)
}

/// Update a pipeline's name, script or status
///
/// Runs already started keep the script they were launched with.
pub async fn update_pipeline(
    pipelines: &dyn PipelineRepository,
    id: Uuid,
    req: UpdatePipeline,
) -> Result<Pipeline> {
    let mut pipeline = get_pipeline(pipelines, id).await?;

    if let Some(name) = req.name {
        validate_name(&name)?;
        pipeline.name = name.trim().to_string();
    }

    if let Some(script) = req.script {
        validate_script(&script)?;
        pipeline.script = script;
    }

    if let Some(status) = req.status {
        pipeline.status = status;
    }

    pipeline.updated_at = chrono::Utc::now();

    if !pipelines.update(&pipeline).await? {
        return Err(PipelineError::NotFound(id));
    }

    tracing::info!("Pipeline updated: {} ({})", pipeline.name, pipeline.id);

    Ok(pipeline)
}

/// Delete a pipeline and its run history
///
/// Refused while any of its runs is pending or running.
pub async fn delete_pipeline(pipelines: &dyn PipelineRepository, id: Uuid) -> Result<()> {
    match pipelines.delete(id).await? {
        PipelineDeletion::Deleted => {}
        PipelineDeletion::NotFound => return Err(PipelineError::NotFound(id)),
        PipelineDeletion::ActiveRuns(active) => {
            return Err(PipelineError::Conflict(format!(
                "Pipeline {} has {} active run(s)",
                id, active
            )));
        }
    }

    tracing::info!("Pipeline deleted: {}", id);

    Ok(())
}

// =============================================================================
// Validation
// =============================================================================

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(PipelineError::Validation(
            "Pipeline name cannot be empty".to_string(),
        ));
    }

    if name.len() > 255 {
        return Err(PipelineError::Validation(
            "Pipeline name is too long (max 255 characters)".to_string(),
        ));
    }

    Ok(())
}

fn validate_script(script: &str) -> Result<()> {
    if script.trim().is_empty() {
        return Err(PipelineError::Validation(
            "Pipeline script cannot be empty".to_string(),
        ));
    }

    Ok(())
}
