//! Error types for the run lifecycle

use ciencia_core::domain::run::RunStatus;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, RunError>;

/// Filesystem failures while preparing a run's workspace
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The run directory exists already; another run's data is never overwritten
    #[error("workspace already exists at {}", .path.display())]
    AlreadyExists { path: PathBuf },

    /// Creation or write refused by the filesystem
    #[error("workspace error: failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The engine process could not be started
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("engine executable '{}' not found", .executable.display())]
    NotFound { executable: PathBuf },

    #[error("failed to spawn engine '{}': {source}", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("spawned engine has no {0} pipe")]
    MissingPipe(&'static str),
}

/// The completion of a running process could not be observed
#[derive(Debug, Error)]
pub enum MonitoringError {
    #[error("failed to wait for engine process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("no watcher is attached to the engine process")]
    Detached,

    #[error("process handle lost across a service restart")]
    Orphaned,
}

/// Malformed run parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("parameter name cannot be empty")]
    EmptyKey,

    #[error("invalid parameter name '{0}': use letters, digits, '_', '-' or '.' and do not start with '-'")]
    InvalidKey(String),

    #[error("parameter '{0}' collides with a reserved engine flag")]
    ReservedKey(String),

    #[error("parameter '{key}' has a {kind} value; only strings, numbers and booleans are accepted")]
    UnsupportedValue { key: String, kind: &'static str },
}

/// Persistence backend failure
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record {0} already exists")]
    Duplicate(Uuid),
}

/// Errors surfaced by the tracker and orchestrator
///
/// Setup failures (`WorkspaceError`, `LaunchError`) never appear here once a
/// run record exists: they become a `failed` run instead.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("run {0} not found")]
    NotFound(Uuid),

    #[error("pipeline {0} not found")]
    PipelineNotFound(Uuid),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("run {run_id}: event '{event}' is not allowed while {from}")]
    InvalidTransition {
        run_id: Uuid,
        from: RunStatus,
        event: &'static str,
    },

    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RunError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RunError::NotFound(_) | RunError::PipelineNotFound(_))
    }
}
