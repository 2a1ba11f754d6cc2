//! Run DTOs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::domain::run::{Run, RunStatus};

/// Body of an execute request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteRun {
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
}

/// Immediate answer to an execute request
///
/// `status` is the post-dispatch status (`running` or `failed`); callers poll
/// the run to observe completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRunResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub message: String,
}

impl From<&Run> for ExecuteRunResponse {
    fn from(run: &Run) -> Self {
        let message = match run.status {
            RunStatus::Failed => format!("Run {} failed to start: {}", run.id, run.logs),
            status => format!("Pipeline execution started. Run ID: {} ({})", run.id, status),
        };

        ExecuteRunResponse {
            run_id: run.id,
            status: run.status,
            message,
        }
    }
}

/// Full status view of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunView {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub status: RunStatus,
    pub logs: String,
    pub output_dir: PathBuf,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Run> for RunView {
    fn from(run: Run) -> Self {
        RunView {
            id: run.id,
            pipeline_id: run.pipeline_id,
            status: run.status,
            logs: run.logs,
            output_dir: run.output_dir,
            started_at: run.started_at,
            completed_at: run.completed_at,
        }
    }
}

/// Run listing entry (logs omitted)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub status: RunStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Run> for RunSummary {
    fn from(run: Run) -> Self {
        RunSummary {
            id: run.id,
            pipeline_id: run.pipeline_id,
            status: run.status,
            created_at: run.created_at,
            started_at: run.started_at,
            completed_at: run.completed_at,
        }
    }
}

/// Answer to a cancel request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRunResponse {
    pub run_id: Uuid,
    pub status: RunStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_with(status: RunStatus, logs: &str) -> Run {
        let mut run = Run::pending(
            Uuid::new_v4(),
            Uuid::new_v4(),
            PathBuf::from("/runs/run_1"),
            PathBuf::from("/runs/run_1/output"),
            HashMap::new(),
        );
        run.status = status;
        run.logs = logs.to_string();
        run
    }

    #[test]
    fn test_execute_response_for_failed_run_carries_error() {
        let run = run_with(RunStatus::Failed, "workspace already exists");
        let response = ExecuteRunResponse::from(&run);
        assert_eq!(response.status, RunStatus::Failed);
        assert!(response.message.contains("workspace already exists"));
    }

    #[test]
    fn test_execute_response_for_running_run() {
        let run = run_with(RunStatus::Running, "");
        let response = ExecuteRunResponse::from(&run);
        assert_eq!(response.run_id, run.id);
        assert!(response.message.contains("started"));
    }

    #[test]
    fn test_execute_request_params_default_to_empty() {
        let req: ExecuteRun = serde_json::from_str("{}").unwrap();
        assert!(req.params.is_empty());
    }
}
