//! Persistence seams
//!
//! The lifecycle consumes storage only through these traits. The orchestrator
//! provides Postgres implementations; `InMemoryRunStore` backs tests and
//! storage-less deployments.

use async_trait::async_trait;
use ciencia_core::domain::pipeline::Pipeline;
use ciencia_core::domain::run::{Run, RunStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

/// Storage for run records
///
/// Plain CRUD: all lifecycle rules live in the tracker.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Inserts a new run record
    async fn create(&self, run: &Run) -> Result<(), StoreError>;

    /// Finds a run by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Run>, StoreError>;

    /// Overwrites the mutable fields of an existing run in a single write
    async fn update(&self, run: &Run) -> Result<(), StoreError>;

    /// Lists the runs of a pipeline, newest first
    async fn list_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Run>, StoreError>;

    /// Lists runs currently in `status`, oldest first
    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError>;
}

/// Read-only access to stored pipeline definitions
#[async_trait]
pub trait PipelineSource: Send + Sync {
    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError>;
}

/// A fixed set of pipelines, handy when embedding the lifecycle without a
/// pipeline catalogue
#[async_trait]
impl PipelineSource for HashMap<Uuid, Pipeline> {
    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        Ok(self.get(&id).cloned())
    }
}

/// In-memory run store
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<HashMap<Uuid, Run>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.id) {
            return Err(StoreError::Duplicate(run.id));
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Run>, StoreError> {
        Ok(self.runs.read().await.get(&id).cloned())
    }

    async fn update(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("run {} does not exist", run.id))),
        }
    }

    async fn list_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Run>, StoreError> {
        let mut runs: Vec<Run> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let mut runs: Vec<Run> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs)
    }
}
