//! CiencIA Runner
//!
//! The pipeline run lifecycle manager. It turns a stored pipeline definition
//! plus a parameter set into an isolated run of the external workflow engine,
//! tracks the run's state transitions and persists its outcome.
//!
//! Architecture:
//! - Configuration: engine invocation and workspace settings
//! - Workspace: one private directory per run holding the script and outputs
//! - Launcher: spawns the engine as a child process without waiting on it
//! - Store: persistence seam for run records and pipeline lookups
//! - Services: the run state tracker and the lifecycle orchestrator
//! - Scheduler: the per-run completion watcher that drains logs and commits
//!   the terminal transition

pub mod config;
pub mod error;
pub mod launcher;
pub mod params;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod workspace;

pub use config::EngineConfig;
pub use error::{
    LaunchError, MonitoringError, Result, RunError, StoreError, ValidationError, WorkspaceError,
};
pub use launcher::{EngineLauncher, ProcessHandle, ProcessLauncher};
pub use params::EngineParams;
pub use service::{LogBuffer, RunEvent, RunOrchestrator, RunTracker, apply_event};
pub use store::{InMemoryRunStore, PipelineSource, RunStore};
pub use workspace::{Workspace, WorkspaceManager};
