//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline management.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use ciencia_core::domain::pipeline::Pipeline;
use ciencia_core::dto::pipeline::{CreatePipeline, PipelineSummary, UpdatePipeline};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::service::pipeline_service;

/// Query parameters of the pipeline listing
#[derive(Debug, Default, Deserialize)]
pub struct ListPipelinesQuery {
    pub project_id: Option<Uuid>,
}

/// POST /pipeline/create
/// Create a new pipeline
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Creating pipeline: {}", req.name);

    let pipeline = pipeline_service::create_pipeline(
        state.projects.as_ref(),
        state.pipelines.as_ref(),
        req,
    )
    .await?;

    Ok(Json(pipeline))
}

/// GET /pipeline/list?project_id=
/// List pipelines, optionally filtered by project
pub async fn list_pipelines(
    State(state): State<AppState>,
    Query(query): Query<ListPipelinesQuery>,
) -> ApiResult<Json<Vec<PipelineSummary>>> {
    tracing::debug!("Listing pipelines (project: {:?})", query.project_id);

    let pipelines =
        pipeline_service::list_pipelines(state.pipelines.as_ref(), query.project_id).await?;

    Ok(Json(pipelines.into_iter().map(PipelineSummary::from).collect()))
}

/// GET /pipeline/{id}
/// Get pipeline by ID
pub async fn get_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Pipeline>> {
    tracing::debug!("Getting pipeline: {}", id);

    let pipeline = pipeline_service::get_pipeline(state.pipelines.as_ref(), id).await?;

    Ok(Json(pipeline))
}

/// PUT /pipeline/{id}
/// Update name, script or status of a pipeline
pub async fn update_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePipeline>,
) -> ApiResult<Json<Pipeline>> {
    tracing::info!("Updating pipeline: {}", id);

    let pipeline = pipeline_service::update_pipeline(state.pipelines.as_ref(), id, req).await?;

    Ok(Json(pipeline))
}

/// DELETE /pipeline/{id}
/// Delete a pipeline
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    pipeline_service::delete_pipeline(state.pipelines.as_ref(), id).await?;

    Ok(StatusCode::NO_CONTENT)
}
