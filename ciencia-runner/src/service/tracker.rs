//! Run state tracker
//!
//! Owns the authoritative state machine of a run:
//!
//! | From    | Event          | To        | Effect                                             |
//! |---------|----------------|-----------|----------------------------------------------------|
//! | pending | Launched       | running   | set `started_at` and `process_id`, clear `logs`    |
//! | running | Exited(0)      | completed | set `completed_at`, release the process            |
//! | running | Exited(≠0)     | failed    | as above, append the exit code to `logs`           |
//! | pending | SetupFailed    | failed    | set `completed_at`, `logs` = the setup error       |
//! | running | MonitoringLost | failed    | set `completed_at`, append the monitoring error    |
//! | running | Cancelled      | failed    | set `completed_at`, append the cancellation marker |
//!
//! Transitions for one run are serialized by a per-run lock and committed
//! with a single store write; different runs never contend.

use chrono::{DateTime, Utc};
use ciencia_core::domain::run::{Run, RunStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, RunError};
use crate::store::RunStore;

/// Something that happened to a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// The engine process was spawned
    Launched { process_id: Option<u32> },
    /// The engine process exited; `None` when killed by a signal
    Exited { exit_code: Option<i32> },
    /// Workspace or launch setup failed before any process existed
    SetupFailed { error: String },
    /// The process's completion can no longer be observed
    MonitoringLost { error: String },
    /// The process was terminated on request or by the duration limit
    Cancelled { reason: String },
}

impl RunEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::Launched { .. } => "launched",
            RunEvent::Exited { .. } => "exited",
            RunEvent::SetupFailed { .. } => "setup_failed",
            RunEvent::MonitoringLost { .. } => "monitoring_lost",
            RunEvent::Cancelled { .. } => "cancelled",
        }
    }
}

/// Applies an event to a run according to the transition table
///
/// Leaves the run untouched and returns `InvalidTransition` when the table
/// has no row for the current status and event.
pub fn apply_event(run: &mut Run, event: RunEvent, now: DateTime<Utc>) -> Result<()> {
    let invalid = |run: &Run, event: &RunEvent| RunError::InvalidTransition {
        run_id: run.id,
        from: run.status,
        event: event.name(),
    };

    match (run.status, event) {
        (RunStatus::Pending, RunEvent::Launched { process_id }) => {
            run.status = RunStatus::Running;
            run.started_at = Some(now);
            run.process_id = process_id;
            run.logs.clear();
        }
        (RunStatus::Pending, RunEvent::SetupFailed { error }) => {
            run.status = RunStatus::Failed;
            run.completed_at = Some(now);
            run.logs = error;
        }
        (RunStatus::Running, RunEvent::Exited { exit_code: Some(0) }) => {
            finish(run, RunStatus::Completed, now);
        }
        (RunStatus::Running, RunEvent::Exited { exit_code }) => {
            let line = match exit_code {
                Some(code) => format!("process exited with code {}", code),
                None => "process terminated by signal".to_string(),
            };
            push_line(&mut run.logs, &line);
            finish(run, RunStatus::Failed, now);
        }
        (RunStatus::Running, RunEvent::MonitoringLost { error }) => {
            push_line(&mut run.logs, &format!("monitoring lost: {}", error));
            finish(run, RunStatus::Failed, now);
        }
        (RunStatus::Running, RunEvent::Cancelled { reason }) => {
            push_line(&mut run.logs, &format!("run cancelled: {}", reason));
            finish(run, RunStatus::Failed, now);
        }
        (_, event) => return Err(invalid(&*run, &event)),
    }

    Ok(())
}

fn finish(run: &mut Run, status: RunStatus, now: DateTime<Utc>) {
    debug_assert!(run.status.can_transition_to(status));
    run.status = status;
    run.completed_at = Some(now);
    run.process_id = None;
}

/// Appends a line, keeping earlier output on its own line
fn push_line(logs: &mut String, line: &str) {
    if !logs.is_empty() && !logs.ends_with('\n') {
        logs.push('\n');
    }
    logs.push_str(line);
    logs.push('\n');
}

/// Serializes and persists run state changes
pub struct RunTracker {
    store: Arc<dyn RunStore>,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl RunTracker {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, run_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(run_id).or_default().clone()
    }

    async fn load(&self, run_id: Uuid) -> Result<Run> {
        self.store
            .find_by_id(run_id)
            .await?
            .ok_or(RunError::NotFound(run_id))
    }

    /// Persists a new `pending` run
    pub async fn create(&self, run: Run) -> Result<Run> {
        if run.status != RunStatus::Pending {
            return Err(RunError::InvalidState(format!(
                "new run {} must start pending (got {})",
                run.id, run.status
            )));
        }

        self.store.create(&run).await?;
        info!("Run {} created for pipeline {}", run.id, run.pipeline_id);
        Ok(run)
    }

    /// Applies an event and commits the resulting state
    ///
    /// This is the only way a run's status changes.
    pub async fn transition(&self, run_id: Uuid, event: RunEvent) -> Result<Run> {
        let lock = self.lock_for(run_id);
        let _guard = lock.lock().await;

        let result = self.commit(run_id, event).await;

        let settled = match &result {
            Ok(run) => run.is_terminal(),
            Err(RunError::NotFound(_)) => true,
            Err(RunError::InvalidTransition { from, .. }) => from.is_terminal(),
            Err(_) => false,
        };
        if settled {
            self.release(run_id);
        }

        result
    }

    async fn commit(&self, run_id: Uuid, event: RunEvent) -> Result<Run> {
        let mut run = self.load(run_id).await?;
        let from = run.status;
        let event_name = event.name();

        apply_event(&mut run, event, Utc::now())?;
        self.store.update(&run).await?;

        info!(
            "Run {} transitioned {} -> {} ({})",
            run_id, from, run.status, event_name
        );
        Ok(run)
    }

    /// Drops the lock entry of a run that can no longer change
    ///
    /// Waiters still queued on the old lock find the run terminal or missing
    /// and reject their mutation.
    fn release(&self, run_id: Uuid) {
        self.locks.lock().remove(&run_id);
    }

    /// Appends captured output to a running run
    ///
    /// Returns `false` and drops the chunk when the run is no longer running,
    /// so logs stay frozen once terminal.
    pub async fn append_logs(&self, run_id: Uuid, chunk: &str) -> Result<bool> {
        if chunk.is_empty() {
            return Ok(true);
        }

        let lock = self.lock_for(run_id);
        let _guard = lock.lock().await;

        let mut run = match self.load(run_id).await {
            Ok(run) => run,
            Err(e) => {
                if matches!(e, RunError::NotFound(_)) {
                    self.release(run_id);
                }
                return Err(e);
            }
        };
        if run.status != RunStatus::Running {
            if run.is_terminal() {
                self.release(run_id);
            }
            debug!(
                "Dropping {} bytes of output for run {} in state {}",
                chunk.len(),
                run_id,
                run.status
            );
            return Ok(false);
        }

        run.logs.push_str(chunk);
        self.store.update(&run).await?;
        Ok(true)
    }

    /// Returns the latest committed state of a run
    pub async fn get_status(&self, run_id: Uuid) -> Result<Run> {
        self.load(run_id).await
    }

    pub async fn list_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Run>> {
        Ok(self.store.list_by_pipeline(pipeline_id).await?)
    }

    pub async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>> {
        Ok(self.store.list_by_status(status).await?)
    }
}
