//! Run API Handlers
//!
//! HTTP endpoints for executing pipelines and following their runs.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use ciencia_core::dto::run::{
    CancelRunResponse, ExecuteRun, ExecuteRunResponse, RunSummary, RunView,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::service::run_service;

/// Query parameters of a cancel request
#[derive(Debug, Default, Deserialize)]
pub struct CancelQuery {
    pub reason: Option<String>,
}

/// POST /pipeline/{id}/execute
/// Start a run; answers with the post-dispatch status without waiting for
/// the engine
pub async fn execute_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExecuteRun>,
) -> ApiResult<Json<ExecuteRunResponse>> {
    tracing::info!("Executing pipeline {} with {} param(s)", id, req.params.len());

    let run = run_service::execute_pipeline(&state.runs, id, req).await?;

    Ok(Json(ExecuteRunResponse::from(&run)))
}

/// GET /pipeline/{id}/runs
/// List the runs of a pipeline
pub async fn list_pipeline_runs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<RunSummary>>> {
    tracing::debug!("Listing runs of pipeline {}", id);

    let runs = run_service::list_pipeline_runs(state.pipelines.as_ref(), &state.runs, id).await?;

    Ok(Json(runs.into_iter().map(RunSummary::from).collect()))
}

/// GET /run/{id}
/// Get the status, logs and output location of a run
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RunView>> {
    tracing::debug!("Getting run: {}", id);

    let run = run_service::get_run(&state.runs, id).await?;

    Ok(Json(RunView::from(run)))
}

/// POST /run/{id}/cancel?reason=
/// Cancel a running run
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<CancelQuery>,
) -> ApiResult<Json<CancelRunResponse>> {
    tracing::info!("Cancelling run: {}", id);

    let run = run_service::cancel_run(&state.runs, id, query.reason).await?;

    Ok(Json(CancelRunResponse {
        run_id: run.id,
        status: run.status,
    }))
}
