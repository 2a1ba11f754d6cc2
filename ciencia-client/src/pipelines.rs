//! Pipeline-related API endpoints

use crate::CienciaClient;
use crate::error::Result;
use ciencia_core::domain::pipeline::Pipeline;
use ciencia_core::dto::pipeline::{CreatePipeline, PipelineSummary, UpdatePipeline};
use uuid::Uuid;

impl CienciaClient {
    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// Create a new pipeline
    ///
    /// # Arguments
    /// * `req` - Owning project, name and workflow script
    pub async fn create_pipeline(&self, req: CreatePipeline) -> Result<Pipeline> {
        let url = self.api_url("/pipeline/create");
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// List pipelines, optionally restricted to one project
    pub async fn list_pipelines(&self, project_id: Option<Uuid>) -> Result<Vec<PipelineSummary>> {
        let url = self.api_url("/pipeline/list");
        let mut request = self.client.get(&url);
        if let Some(project_id) = project_id {
            request = request.query(&[("project_id", project_id.to_string())]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }

    /// Get a pipeline by ID, including its script
    pub async fn get_pipeline(&self, pipeline_id: Uuid) -> Result<Pipeline> {
        let url = self.api_url(&format!("/pipeline/{}", pipeline_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Update a pipeline; fields left `None` are unchanged
    pub async fn update_pipeline(
        &self,
        pipeline_id: Uuid,
        req: UpdatePipeline,
    ) -> Result<Pipeline> {
        let url = self.api_url(&format!("/pipeline/{}", pipeline_id));
        let response = self.client.put(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Delete a pipeline
    ///
    /// # Arguments
    /// * `pipeline_id` - The pipeline UUID to delete
    pub async fn delete_pipeline(&self, pipeline_id: Uuid) -> Result<()> {
        let url = self.api_url(&format!("/pipeline/{}", pipeline_id));
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
