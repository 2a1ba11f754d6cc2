//! Pipeline DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::{Pipeline, PipelineStatus};

/// Request to create a new pipeline inside a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub project_id: Uuid,
    pub name: String,
    pub script: String,
}

/// Partial update of a pipeline; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePipeline {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub status: Option<PipelineStatus>,
}

/// Pipeline listing entry (script omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub status: PipelineStatus,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Pipeline> for PipelineSummary {
    fn from(pipeline: Pipeline) -> Self {
        PipelineSummary {
            id: pipeline.id,
            project_id: pipeline.project_id,
            name: pipeline.name,
            status: pipeline.status,
            updated_at: pipeline.updated_at,
        }
    }
}
