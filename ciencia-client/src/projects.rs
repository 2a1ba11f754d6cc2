//! Project-related API endpoints

use crate::CienciaClient;
use crate::error::Result;
use ciencia_core::domain::project::Project;
use ciencia_core::dto::project::CreateProject;
use uuid::Uuid;

impl CienciaClient {
    // =============================================================================
    // Project Management
    // =============================================================================

    /// Create a new project
    pub async fn create_project(&self, req: CreateProject) -> Result<Project> {
        let url = self.api_url("/project/create");
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// List all projects
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let url = self.api_url("/project/list");
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get a project by ID
    pub async fn get_project(&self, project_id: Uuid) -> Result<Project> {
        let url = self.api_url(&format!("/project/{}", project_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Delete a project
    ///
    /// Fails with a conflict while the project still has pipelines.
    pub async fn delete_project(&self, project_id: Uuid) -> Result<()> {
        let url = self.api_url(&format!("/project/{}", project_id));
        let response = self.client.delete(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
