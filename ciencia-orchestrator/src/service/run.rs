//! Run Service
//!
//! Entry points from the API into the run lifecycle.

use ciencia_core::domain::run::Run;
use ciencia_core::dto::run::ExecuteRun;
use ciencia_runner::{Result, RunError, RunOrchestrator};
use uuid::Uuid;

use crate::repository::PipelineRepository;

/// Start a run of a pipeline
///
/// Returns once the run is `running` or has failed during setup.
pub async fn execute_pipeline(
    runs: &RunOrchestrator,
    pipeline_id: Uuid,
    req: ExecuteRun,
) -> Result<Run> {
    let run = runs.execute(pipeline_id, &req.params).await?;

    tracing::info!(
        "Run {} of pipeline {} dispatched ({})",
        run.id,
        pipeline_id,
        run.status
    );

    Ok(run)
}

/// Get the current state of a run
pub async fn get_run(runs: &RunOrchestrator, id: Uuid) -> Result<Run> {
    runs.get_status(id).await
}

/// List the runs of an existing pipeline, newest first
pub async fn list_pipeline_runs(
    pipelines: &dyn PipelineRepository,
    runs: &RunOrchestrator,
    pipeline_id: Uuid,
) -> Result<Vec<Run>> {
    if pipelines.find_by_id(pipeline_id).await?.is_none() {
        return Err(RunError::PipelineNotFound(pipeline_id));
    }

    runs.list_runs(pipeline_id).await
}

/// Cancel a run
pub async fn cancel_run(runs: &RunOrchestrator, id: Uuid, reason: Option<String>) -> Result<Run> {
    let run = runs.cancel_run(id, reason).await?;

    tracing::info!("Cancel requested for run {}, now {}", id, run.status);

    Ok(run)
}
