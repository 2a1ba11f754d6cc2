//! Run-related API endpoints

use crate::CienciaClient;
use crate::error::Result;
use ciencia_core::dto::run::{
    CancelRunResponse, ExecuteRun, ExecuteRunResponse, RunSummary, RunView,
};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

impl CienciaClient {
    // =============================================================================
    // Run Lifecycle
    // =============================================================================

    /// Start a run of a pipeline
    ///
    /// Returns as soon as the run is dispatched; poll [`CienciaClient::get_run`]
    /// to follow it.
    ///
    /// # Arguments
    /// * `pipeline_id` - The pipeline to execute
    /// * `params` - Engine parameters, each passed as `--key value`
    pub async fn execute_pipeline(
        &self,
        pipeline_id: Uuid,
        params: HashMap<String, Value>,
    ) -> Result<ExecuteRunResponse> {
        let url = self.api_url(&format!("/pipeline/{}/execute", pipeline_id));
        let response = self
            .client
            .post(&url)
            .json(&ExecuteRun { params })
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get the status, logs and output location of a run
    pub async fn get_run(&self, run_id: Uuid) -> Result<RunView> {
        let url = self.api_url(&format!("/run/{}", run_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// List the runs of a pipeline, newest first
    pub async fn list_pipeline_runs(&self, pipeline_id: Uuid) -> Result<Vec<RunSummary>> {
        let url = self.api_url(&format!("/pipeline/{}/runs", pipeline_id));
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Cancel a running run
    pub async fn cancel_run(
        &self,
        run_id: Uuid,
        reason: Option<&str>,
    ) -> Result<CancelRunResponse> {
        let url = self.api_url(&format!("/run/{}/cancel", run_id));
        let mut request = self.client.post(&url);
        if let Some(reason) = reason {
            request = request.query(&[("reason", reason)]);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }
}
