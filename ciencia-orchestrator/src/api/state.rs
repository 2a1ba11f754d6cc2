//! Shared application state

use ciencia_runner::{EngineConfig, RunOrchestrator};
use sqlx::PgPool;
use std::sync::Arc;

use crate::repository::{
    InMemoryPipelineRepository, InMemoryProjectRepository, PgPipelineRepository,
    PgProjectRepository, PgRunStore, PipelineRepository, ProjectRepository,
};

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<dyn ProjectRepository>,
    pub pipelines: Arc<dyn PipelineRepository>,
    pub runs: Arc<RunOrchestrator>,
}

impl AppState {
    /// Builds state backed by Postgres
    pub fn postgres(pool: PgPool, engine: EngineConfig) -> anyhow::Result<Self> {
        let pipelines = Arc::new(PgPipelineRepository::new(pool.clone()));
        let runs = RunOrchestrator::new(
            engine,
            Arc::new(PgRunStore::new(pool.clone())),
            pipelines.clone(),
        )?;

        Ok(Self {
            projects: Arc::new(PgProjectRepository::new(pool)),
            pipelines,
            runs: Arc::new(runs),
        })
    }

    /// Builds state that lives only as long as the process
    pub fn in_memory(engine: EngineConfig) -> anyhow::Result<Self> {
        let pipelines = Arc::new(InMemoryPipelineRepository::new());
        let runs = RunOrchestrator::new(
            engine,
            Arc::new(pipelines.run_store()),
            pipelines.clone(),
        )?;

        Ok(Self {
            projects: Arc::new(InMemoryProjectRepository::new()),
            pipelines,
            runs: Arc::new(runs),
        })
    }
}
