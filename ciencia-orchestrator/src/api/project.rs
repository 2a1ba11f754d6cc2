//! Project API Handlers
//!
//! HTTP endpoints for project management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ciencia_core::domain::project::Project;
use ciencia_core::dto::project::CreateProject;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::service::project_service;

/// POST /project/create
/// Create a new project
pub async fn create_project(
    State(state): State<AppState>,
    Json(req): Json<CreateProject>,
) -> ApiResult<Json<Project>> {
    tracing::info!("Creating project: {}", req.name);

    let project = project_service::create_project(state.projects.as_ref(), req).await?;

    Ok(Json(project))
}

/// GET /project/list
/// List all projects
pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    tracing::debug!("Listing all projects");

    let projects = project_service::list_projects(state.projects.as_ref()).await?;

    Ok(Json(projects))
}

/// GET /project/{id}
/// Get project by ID
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    tracing::debug!("Getting project: {}", id);

    let project = project_service::get_project(state.projects.as_ref(), id).await?;

    Ok(Json(project))
}

/// DELETE /project/{id}
/// Delete a project without pipelines
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting project: {}", id);

    project_service::delete_project(state.projects.as_ref(), state.pipelines.as_ref(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}
