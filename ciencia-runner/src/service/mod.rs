//! Service layer
//!
//! Services hold the lifecycle logic. The tracker owns the run state machine
//! and is the only writer of run status; the orchestrator sequences workspace
//! setup, launch and monitoring on top of it.

mod log_buffer;
mod orchestrator;
mod tracker;

pub use log_buffer::LogBuffer;
pub use orchestrator::RunOrchestrator;
pub use tracker::{RunEvent, RunTracker, apply_event};

pub(crate) use orchestrator::{ActiveRuns, CancelRequest};
