//! Lifecycle orchestrator
//!
//! Entry point of the run lifecycle. Sequences parameter validation, record
//! creation, workspace setup and launch, then hands the process to a watcher
//! and returns without waiting for the engine.

use ciencia_core::domain::pipeline::Pipeline;
use ciencia_core::domain::run::{Run, RunStatus};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::tracker::{RunEvent, RunTracker};
use crate::config::EngineConfig;
use crate::error::{MonitoringError, Result, RunError};
use crate::launcher::{EngineLauncher, ProcessHandle, ProcessLauncher};
use crate::params::EngineParams;
use crate::scheduler::RunWatcher;
use crate::store::{PipelineSource, RunStore};
use crate::workspace::WorkspaceManager;

const DEFAULT_CANCEL_REASON: &str = "cancelled by user";

/// Runs with a live watcher, keyed by run id
pub(crate) type ActiveRuns = Arc<Mutex<HashMap<Uuid, mpsc::Sender<CancelRequest>>>>;

/// Asks a watcher to terminate its process
///
/// The watcher answers on `ack` with the committed terminal run.
pub(crate) struct CancelRequest {
    pub reason: String,
    pub ack: oneshot::Sender<Run>,
}

/// Drives runs from request to terminal state
pub struct RunOrchestrator {
    config: Arc<EngineConfig>,
    tracker: Arc<RunTracker>,
    workspaces: WorkspaceManager,
    launcher: Arc<dyn ProcessLauncher>,
    pipelines: Arc<dyn PipelineSource>,
    active: ActiveRuns,
}

impl RunOrchestrator {
    /// Creates an orchestrator launching the configured engine
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn RunStore>,
        pipelines: Arc<dyn PipelineSource>,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let launcher = Arc::new(EngineLauncher::new(Arc::clone(&config)));
        Self::build(config, store, pipelines, launcher)
    }

    /// Creates an orchestrator with a custom process launcher
    pub fn with_launcher(
        config: EngineConfig,
        store: Arc<dyn RunStore>,
        pipelines: Arc<dyn PipelineSource>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> anyhow::Result<Self> {
        Self::build(Arc::new(config), store, pipelines, launcher)
    }

    fn build(
        config: Arc<EngineConfig>,
        store: Arc<dyn RunStore>,
        pipelines: Arc<dyn PipelineSource>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let workspaces = WorkspaceManager::new(config.runs_dir.clone())?;

        Ok(Self {
            config,
            tracker: Arc::new(RunTracker::new(store)),
            workspaces,
            launcher,
            pipelines,
            active: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn tracker(&self) -> &Arc<RunTracker> {
        &self.tracker
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Starts a run of a stored pipeline
    ///
    /// Parameters are validated and the pipeline is resolved before anything
    /// is created, so both failures leave no record and no workspace behind.
    pub async fn execute(
        &self,
        pipeline_id: Uuid,
        params: &HashMap<String, JsonValue>,
    ) -> Result<Run> {
        let engine_params = EngineParams::from_json(params, &self.config.reserved_params)?;

        let pipeline = self
            .pipelines
            .get_pipeline(pipeline_id)
            .await?
            .ok_or(RunError::PipelineNotFound(pipeline_id))?;

        self.start(&pipeline, params, engine_params).await
    }

    /// Starts a run of an already loaded pipeline
    pub async fn execute_run(
        &self,
        pipeline: &Pipeline,
        params: &HashMap<String, JsonValue>,
    ) -> Result<Run> {
        let engine_params = EngineParams::from_json(params, &self.config.reserved_params)?;
        self.start(pipeline, params, engine_params).await
    }

    /// Creates the record and drives it to `running` or `failed`
    ///
    /// Setup failures become a failed run; only storage errors propagate.
    async fn start(
        &self,
        pipeline: &Pipeline,
        params: &HashMap<String, JsonValue>,
        engine_params: EngineParams,
    ) -> Result<Run> {
        let run_id = Uuid::new_v4();
        let workspace = self.workspaces.path_for(run_id);

        self.tracker
            .create(Run::pending(
                run_id,
                pipeline.id,
                workspace.root.clone(),
                workspace.output_dir.clone(),
                params.clone(),
            ))
            .await?;

        let mut handle = match self.prepare(run_id, &pipeline.script, &engine_params).await {
            Ok(handle) => handle,
            Err(error) => {
                warn!("Run {} failed during setup: {}", run_id, error);
                return self
                    .tracker
                    .transition(run_id, RunEvent::SetupFailed { error })
                    .await;
            }
        };

        let (cancel_tx, cancel_rx) = mpsc::channel(8);
        self.active.lock().insert(run_id, cancel_tx);

        let process_id = handle.process_id();
        let run = match self
            .tracker
            .transition(run_id, RunEvent::Launched { process_id })
            .await
        {
            Ok(run) => run,
            Err(e) => {
                error!("Failed to record launch of run {}: {}", run_id, e);
                self.active.lock().remove(&run_id);
                let _ = handle.start_kill();
                let _ = self
                    .tracker
                    .transition(
                        run_id,
                        RunEvent::SetupFailed {
                            error: format!("failed to record launch: {}", e),
                        },
                    )
                    .await;
                return Err(e);
            }
        };

        RunWatcher::new(
            run_id,
            handle,
            Arc::clone(&self.tracker),
            cancel_rx,
            Arc::clone(&self.active),
            self.config.log_flush_interval,
            self.config.max_run_duration,
        )
        .spawn();

        info!(
            "Run {} of pipeline {} started (pid {:?})",
            run_id, pipeline.id, process_id
        );
        Ok(run)
    }

    /// Creates the workspace, writes the script and launches the engine
    async fn prepare(
        &self,
        run_id: Uuid,
        script: &str,
        params: &EngineParams,
    ) -> std::result::Result<ProcessHandle, String> {
        let workspace = self
            .workspaces
            .create_workspace(run_id)
            .await
            .map_err(|e| e.to_string())?;

        self.workspaces
            .write_script(&workspace, script)
            .await
            .map_err(|e| e.to_string())?;

        self.launcher
            .launch(&workspace, params)
            .map_err(|e| e.to_string())
    }

    /// Returns the latest committed state of a run
    pub async fn get_status(&self, run_id: Uuid) -> Result<Run> {
        self.tracker.get_status(run_id).await
    }

    /// Lists the runs of a pipeline, newest first
    pub async fn list_runs(&self, pipeline_id: Uuid) -> Result<Vec<Run>> {
        self.tracker.list_by_pipeline(pipeline_id).await
    }

    /// Cancels a run
    ///
    /// - terminal: returned unchanged
    /// - running: the process is killed and the call waits up to
    ///   `cancel_grace` for the failed state to be committed
    /// - running without a watcher: failed as unobservable
    /// - pending: rejected, setup is still in progress
    pub async fn cancel_run(&self, run_id: Uuid, reason: Option<String>) -> Result<Run> {
        let run = self.tracker.get_status(run_id).await?;

        match run.status {
            RunStatus::Completed | RunStatus::Failed => Ok(run),
            RunStatus::Pending => Err(RunError::InvalidState(format!(
                "run {} is still being set up and cannot be cancelled yet",
                run_id
            ))),
            RunStatus::Running => {
                let sender = self.active.lock().get(&run_id).cloned();
                match sender {
                    Some(sender) => {
                        let reason = reason.unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());
                        self.request_cancel(run_id, sender, reason).await
                    }
                    None => self.fail_detached(run_id).await,
                }
            }
        }
    }

    async fn request_cancel(
        &self,
        run_id: Uuid,
        sender: mpsc::Sender<CancelRequest>,
        reason: String,
    ) -> Result<Run> {
        let (ack, ack_rx) = oneshot::channel();

        if sender.send(CancelRequest { reason, ack }).await.is_err() {
            // watcher finished between the status read and the send
            return self.tracker.get_status(run_id).await;
        }

        match time::timeout(self.config.cancel_grace, ack_rx).await {
            Ok(Ok(run)) => Ok(run),
            Ok(Err(_)) => self.tracker.get_status(run_id).await,
            Err(_) => {
                warn!(
                    "Run {} did not stop within {:?} of being cancelled",
                    run_id, self.config.cancel_grace
                );
                self.tracker.get_status(run_id).await
            }
        }
    }

    async fn fail_detached(&self, run_id: Uuid) -> Result<Run> {
        warn!("Run {} is running without a watcher, marking it failed", run_id);

        let event = RunEvent::MonitoringLost {
            error: MonitoringError::Detached.to_string(),
        };
        match self.tracker.transition(run_id, event).await {
            Ok(run) => Ok(run),
            // the watcher committed first
            Err(RunError::InvalidTransition { .. }) => self.tracker.get_status(run_id).await,
            Err(e) => Err(e),
        }
    }

    /// Fails runs left `pending` or `running` by a previous service lifetime
    ///
    /// Their process handles are gone, so their completion can never be
    /// observed. Must be called before the orchestrator starts any run.
    pub async fn reconcile_orphans(&self) -> Result<usize> {
        let mut reconciled = 0;

        for run in self.tracker.list_by_status(RunStatus::Pending).await? {
            let event = RunEvent::SetupFailed {
                error: "run interrupted by a service restart before launch".to_string(),
            };
            if self.reconcile(run.id, event).await? {
                reconciled += 1;
            }
        }

        for run in self.tracker.list_by_status(RunStatus::Running).await? {
            if self.active.lock().contains_key(&run.id) {
                continue;
            }
            let event = RunEvent::MonitoringLost {
                error: MonitoringError::Orphaned.to_string(),
            };
            if self.reconcile(run.id, event).await? {
                reconciled += 1;
            }
        }

        if reconciled > 0 {
            warn!("Marked {} orphaned run(s) as failed", reconciled);
        }
        Ok(reconciled)
    }

    async fn reconcile(&self, run_id: Uuid, event: RunEvent) -> Result<bool> {
        match self.tracker.transition(run_id, event).await {
            Ok(_) => Ok(true),
            Err(RunError::InvalidTransition { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Number of runs with a live watcher
    pub fn active_runs(&self) -> usize {
        self.active.lock().len()
    }
}
