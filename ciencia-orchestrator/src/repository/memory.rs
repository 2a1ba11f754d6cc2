//! In-memory repositories
//!
//! Back the orchestrator when no database is configured, and the HTTP tests.
//! State lives for the lifetime of the process only.

use async_trait::async_trait;
use ciencia_core::domain::pipeline::Pipeline;
use ciencia_core::domain::project::Project;
use ciencia_core::domain::run::{Run, RunStatus};
use ciencia_runner::{PipelineSource, RunStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{PipelineDeletion, PipelineRepository, ProjectRepository};

#[derive(Debug, Default)]
pub struct InMemoryProjectRepository {
    projects: RwLock<HashMap<Uuid, Project>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn create(&self, project: &Project) -> Result<(), StoreError> {
        let mut projects = self.projects.write().await;
        if projects.contains_key(&project.id) {
            return Err(StoreError::Duplicate(project.id));
        }
        projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.projects.write().await.remove(&id).is_some())
    }
}

/// Pipelines and their runs, kept together so a run always references an
/// existing pipeline
#[derive(Debug, Default)]
struct Tables {
    pipelines: HashMap<Uuid, Pipeline>,
    runs: HashMap<Uuid, Run>,
}

#[derive(Debug, Default)]
pub struct InMemoryPipelineRepository {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryPipelineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run store sharing this repository's tables
    pub fn run_store(&self) -> InMemoryRunRepository {
        InMemoryRunRepository {
            tables: self.tables.clone(),
        }
    }
}

#[async_trait]
impl PipelineRepository for InMemoryPipelineRepository {
    async fn create(&self, pipeline: &Pipeline) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let pipelines = &mut tables.pipelines;
        if pipelines.contains_key(&pipeline.id) {
            return Err(StoreError::Duplicate(pipeline.id));
        }
        pipelines.insert(pipeline.id, pipeline.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        Ok(self.tables.read().await.pipelines.get(&id).cloned())
    }

    async fn list(&self, project_id: Option<Uuid>) -> Result<Vec<Pipeline>, StoreError> {
        let mut pipelines: Vec<Pipeline> = self
            .tables
            .read()
            .await
            .pipelines
            .values()
            .filter(|p| project_id.is_none_or(|id| p.project_id == id))
            .cloned()
            .collect();
        pipelines.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(pipelines)
    }

    async fn update(&self, pipeline: &Pipeline) -> Result<bool, StoreError> {
        match self.tables.write().await.pipelines.get_mut(&pipeline.id) {
            Some(existing) => {
                *existing = pipeline.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<PipelineDeletion, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.pipelines.contains_key(&id) {
            return Ok(PipelineDeletion::NotFound);
        }

        let active = tables
            .runs
            .values()
            .filter(|r| r.pipeline_id == id && !r.is_terminal())
            .count();
        if active > 0 {
            return Ok(PipelineDeletion::ActiveRuns(active as u64));
        }

        tables.runs.retain(|_, r| r.pipeline_id != id);
        tables.pipelines.remove(&id);
        Ok(PipelineDeletion::Deleted)
    }

    async fn count_by_project(&self, project_id: Uuid) -> Result<u64, StoreError> {
        let count = self
            .tables
            .read()
            .await
            .pipelines
            .values()
            .filter(|p| p.project_id == project_id)
            .count();
        Ok(count as u64)
    }
}

#[async_trait]
impl PipelineSource for InMemoryPipelineRepository {
    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        self.find_by_id(id).await
    }
}

/// In-memory run store that refuses runs of unknown pipelines
#[derive(Debug)]
pub struct InMemoryRunRepository {
    tables: Arc<RwLock<Tables>>,
}

#[async_trait]
impl RunStore for InMemoryRunRepository {
    async fn create(&self, run: &Run) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.pipelines.contains_key(&run.pipeline_id) {
            return Err(StoreError::Backend(format!(
                "pipeline {} does not exist",
                run.pipeline_id
            )));
        }
        if tables.runs.contains_key(&run.id) {
            return Err(StoreError::Duplicate(run.id));
        }
        tables.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Run>, StoreError> {
        Ok(self.tables.read().await.runs.get(&id).cloned())
    }

    async fn update(&self, run: &Run) -> Result<(), StoreError> {
        match self.tables.write().await.runs.get_mut(&run.id) {
            Some(existing) => {
                *existing = run.clone();
                Ok(())
            }
            None => Err(StoreError::Backend(format!("run {} does not exist", run.id))),
        }
    }

    async fn list_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Run>, StoreError> {
        let mut runs: Vec<Run> = self
            .tables
            .read()
            .await
            .runs
            .values()
            .filter(|r| r.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(runs)
    }

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let mut runs: Vec<Run> = self
            .tables
            .read()
            .await
            .runs
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        runs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn run_for(pipeline_id: Uuid) -> Run {
        Run::pending(
            Uuid::new_v4(),
            pipeline_id,
            PathBuf::from("/runs/a"),
            PathBuf::from("/runs/a/output"),
            HashMap::new(),
        )
    }

    fn pipeline(project_id: Uuid, name: &str) -> Pipeline {
        let now = chrono::Utc::now();
        Pipeline {
            id: Uuid::new_v4(),
            project_id,
            name: name.to_string(),
            script: "echo hi".to_string(),
            status: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_pipeline_listing_and_counts() {
        let repo = InMemoryPipelineRepository::new();
        let project_a = Uuid::new_v4();
        let project_b = Uuid::new_v4();

        repo.create(&pipeline(project_a, "a1")).await.unwrap();
        repo.create(&pipeline(project_a, "a2")).await.unwrap();
        repo.create(&pipeline(project_b, "b1")).await.unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 3);
        assert_eq!(repo.list(Some(project_a)).await.unwrap().len(), 2);
        assert_eq!(repo.count_by_project(project_b).await.unwrap(), 1);
        assert_eq!(repo.count_by_project(Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pipeline_update_and_delete() {
        let repo = InMemoryPipelineRepository::new();
        let mut p = pipeline(Uuid::new_v4(), "p");
        assert!(!repo.update(&p).await.unwrap());

        repo.create(&p).await.unwrap();
        p.name = "renamed".to_string();
        assert!(repo.update(&p).await.unwrap());
        assert_eq!(
            repo.get_pipeline(p.id).await.unwrap().unwrap().name,
            "renamed"
        );

        assert_eq!(repo.delete(p.id).await.unwrap(), PipelineDeletion::Deleted);
        assert_eq!(repo.delete(p.id).await.unwrap(), PipelineDeletion::NotFound);
        assert!(repo.get_pipeline(p.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_runs_require_an_existing_pipeline() {
        let repo = InMemoryPipelineRepository::new();
        let runs = repo.run_store();

        let err = runs.create(&run_for(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));

        let p = pipeline(Uuid::new_v4(), "p");
        repo.create(&p).await.unwrap();
        let run = run_for(p.id);
        runs.create(&run).await.unwrap();
        assert!(matches!(
            runs.create(&run).await.unwrap_err(),
            StoreError::Duplicate(id) if id == run.id
        ));
        assert_eq!(runs.list_by_pipeline(p.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_refused_while_a_run_is_live() {
        let repo = InMemoryPipelineRepository::new();
        let runs = repo.run_store();
        let p = pipeline(Uuid::new_v4(), "p");
        repo.create(&p).await.unwrap();

        let mut live = run_for(p.id);
        runs.create(&live).await.unwrap();
        live.status = RunStatus::Running;
        runs.update(&live).await.unwrap();
        let mut done = run_for(p.id);
        done.status = RunStatus::Completed;
        runs.create(&done).await.unwrap();

        assert_eq!(
            repo.delete(p.id).await.unwrap(),
            PipelineDeletion::ActiveRuns(1)
        );
        assert!(repo.get_pipeline(p.id).await.unwrap().is_some());
        assert_eq!(runs.list_by_pipeline(p.id).await.unwrap().len(), 2);

        live.status = RunStatus::Failed;
        runs.update(&live).await.unwrap();
        assert_eq!(repo.delete(p.id).await.unwrap(), PipelineDeletion::Deleted);

        // finished runs go with the pipeline, and none can be added afterwards
        assert!(runs.find_by_id(live.id).await.unwrap().is_none());
        assert!(runs.list_by_pipeline(p.id).await.unwrap().is_empty());
        assert!(runs.create(&run_for(p.id)).await.is_err());
    }
}
