//! Run domain types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// One execution attempt of a pipeline's script
///
/// Structure shared between orchestrator (persists and serves) and runner
/// (drives the lifecycle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub status: RunStatus,
    /// Private directory of this run, never shared with another run
    pub workspace_path: PathBuf,
    /// Directory the engine is told to use as its working/result root
    pub output_dir: PathBuf,
    /// OS process id, present only while the run is `running`
    pub process_id: Option<u32>,
    pub parameters: HashMap<String, serde_json::Value>,
    /// Captured stdout and stderr of the engine
    pub logs: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Run {
    /// Creates a fresh `pending` record
    pub fn pending(
        id: Uuid,
        pipeline_id: Uuid,
        workspace_path: PathBuf,
        output_dir: PathBuf,
        parameters: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id,
            pipeline_id,
            status: RunStatus::Pending,
            workspace_path,
            output_dir,
            process_id: None,
            parameters,
            logs: String::new(),
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Run execution status
///
/// `pending -> running -> {completed | failed}`, with `pending -> failed`
/// when setup fails before a process exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Whether the state graph has an edge from `self` to `next`
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status '{}'", other)),
        }
    }
}
