//! Repository Module
//!
//! Data access layer for the orchestrator. Each entity has a repository
//! trait with a Postgres implementation and an in-memory one used when no
//! database is configured.

pub mod memory;
pub mod pipeline;
pub mod project;
pub mod run;

use async_trait::async_trait;
use ciencia_core::domain::pipeline::Pipeline;
use ciencia_core::domain::project::Project;
use ciencia_runner::StoreError;
use uuid::Uuid;

// Re-export for convenience
pub use memory::{InMemoryPipelineRepository, InMemoryProjectRepository, InMemoryRunRepository};
pub use pipeline::PgPipelineRepository;
pub use project::PgProjectRepository;
pub use run::PgRunStore;

/// Storage for projects
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: &Project) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, StoreError>;

    /// Lists all projects, newest first
    async fn list_all(&self) -> Result<Vec<Project>, StoreError>;

    /// Returns `false` when nothing was deleted
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Storage for pipeline definitions
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    async fn create(&self, pipeline: &Pipeline) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError>;

    /// Lists pipelines, optionally restricted to one project, most recently
    /// updated first
    async fn list(&self, project_id: Option<Uuid>) -> Result<Vec<Pipeline>, StoreError>;

    /// Overwrites name, script, status and `updated_at`; `false` if absent
    async fn update(&self, pipeline: &Pipeline) -> Result<bool, StoreError>;

    /// Deletes a pipeline together with its finished runs in one step.
    /// Nothing is deleted while a run is pending or running.
    async fn delete(&self, id: Uuid) -> Result<PipelineDeletion, StoreError>;

    async fn count_by_project(&self, project_id: Uuid) -> Result<u64, StoreError>;
}

/// Outcome of [`PipelineRepository::delete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineDeletion {
    Deleted,
    NotFound,
    /// Number of pending or running runs that blocked the deletion
    ActiveRuns(u64),
}

/// Maps a database failure into the storage error shared with the runner
pub(crate) fn db_error(err: sqlx::Error) -> StoreError {
    tracing::error!("Database error: {:?}", err);
    StoreError::Backend(err.to_string())
}
