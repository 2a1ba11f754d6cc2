//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories and the run lifecycle.

pub mod pipeline;
pub mod project;
pub mod run;

// Re-export for convenience
pub use pipeline as pipeline_service;
pub use project as project_service;
pub use run as run_service;
