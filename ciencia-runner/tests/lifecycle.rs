//! End-to-end lifecycle tests, using `sh` as the workflow engine.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ciencia_core::domain::pipeline::Pipeline;
use ciencia_core::domain::run::{Run, RunStatus};
use ciencia_runner::{
    EngineConfig, EngineLauncher, EngineParams, InMemoryRunStore, LaunchError, ProcessHandle,
    ProcessLauncher, RunError, RunOrchestrator, Workspace,
};
use uuid::Uuid;

/// Delegates to the real launcher while counting launch attempts
struct CountingLauncher {
    inner: EngineLauncher,
    calls: AtomicUsize,
}

impl ProcessLauncher for CountingLauncher {
    fn launch(
        &self,
        workspace: &Workspace,
        params: &EngineParams,
    ) -> Result<ProcessHandle, LaunchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.launch(workspace, params)
    }
}

fn sh_config(runs_dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::new("sh", runs_dir);
    config.engine_args.clear();
    config.work_dir_flag = None;
    config.run_name_flag = None;
    config.log_flush_interval = Duration::from_millis(50);
    config.cancel_grace = Duration::from_secs(5);
    config
}

fn pipeline(script: &str) -> Pipeline {
    let now = chrono::Utc::now();
    Pipeline {
        id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        name: "lifecycle".to_string(),
        script: script.to_string(),
        status: Default::default(),
        created_at: now,
        updated_at: now,
    }
}

/// Builds an orchestrator over the given pipelines plus a launch counter
fn setup(config: EngineConfig, pipelines: &[Pipeline]) -> (RunOrchestrator, Arc<CountingLauncher>) {
    let source: HashMap<Uuid, Pipeline> = pipelines.iter().map(|p| (p.id, p.clone())).collect();
    let launcher = Arc::new(CountingLauncher {
        inner: EngineLauncher::new(Arc::new(config.clone())),
        calls: AtomicUsize::new(0),
    });

    let orchestrator = RunOrchestrator::with_launcher(
        config,
        Arc::new(InMemoryRunStore::new()),
        Arc::new(source),
        launcher.clone(),
    )
    .expect("orchestrator init failed");

    (orchestrator, launcher)
}

async fn wait_terminal(orchestrator: &RunOrchestrator, run_id: Uuid) -> Run {
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        let run = orchestrator.get_status(run_id).await.unwrap();
        if run.is_terminal() {
            return run;
        }
        assert!(Instant::now() < deadline, "run {} did not finish in time", run_id);
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn test_successful_run_captures_output() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline("echo hello");
    let (orchestrator, launcher) = setup(sh_config(dir.path()), &[p.clone()]);

    let run = orchestrator.execute(p.id, &HashMap::new()).await.unwrap();
    assert!(matches!(run.status, RunStatus::Running | RunStatus::Completed));
    assert!(run.started_at.is_some());

    let done = wait_terminal(&orchestrator, run.id).await;
    assert_eq!(done.status, RunStatus::Completed);
    assert!(done.logs.contains("hello"));
    assert!(done.completed_at.is_some());
    assert!(done.process_id.is_none());
    assert_eq!(launcher.calls.load(Ordering::SeqCst), 1);

    // workspace layout
    assert_eq!(
        std::fs::read_to_string(done.workspace_path.join("main.nf")).unwrap(),
        "echo hello"
    );
    assert!(done.output_dir.is_dir());
    assert!(done.output_dir.starts_with(&done.workspace_path));

    // the watcher deregisters once the outcome is committed
    let deadline = Instant::now() + Duration::from_secs(5);
    while orchestrator.active_runs() > 0 {
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_failing_run_records_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline("echo partial\nexit 3");
    let (orchestrator, _) = setup(sh_config(dir.path()), &[p.clone()]);

    let run = orchestrator.execute(p.id, &HashMap::new()).await.unwrap();
    let done = wait_terminal(&orchestrator, run.id).await;

    assert_eq!(done.status, RunStatus::Failed);
    assert!(done.logs.contains("partial"));
    assert!(done.logs.contains("3"));
    assert!(done.logs.contains("process exited with code 3"));
}

#[tokio::test]
async fn test_stderr_is_captured() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline("echo to-stderr >&2");
    let (orchestrator, _) = setup(sh_config(dir.path()), &[p.clone()]);

    let run = orchestrator.execute(p.id, &HashMap::new()).await.unwrap();
    let done = wait_terminal(&orchestrator, run.id).await;
    assert_eq!(done.status, RunStatus::Completed);
    assert!(done.logs.contains("to-stderr"));
}

#[tokio::test]
async fn test_unknown_pipeline_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let runs_dir = dir.path().join("runs");
    let (orchestrator, launcher) = setup(sh_config(&runs_dir), &[]);

    let missing = Uuid::new_v4();
    let err = orchestrator
        .execute(missing, &HashMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::PipelineNotFound(id) if id == missing));
    assert!(err.is_not_found());
    assert!(!runs_dir.exists());
    assert!(orchestrator.list_runs(missing).await.unwrap().is_empty());
    assert_eq!(launcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_workspace_failure_fails_run_without_launch() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("runs");
    std::fs::write(&blocker, "not a directory").unwrap();

    let p = pipeline("echo never");
    let (orchestrator, launcher) = setup(sh_config(&blocker), &[p.clone()]);

    let run = orchestrator.execute(p.id, &HashMap::new()).await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.logs.contains("workspace"));
    assert!(run.started_at.is_none());
    assert_eq!(launcher.calls.load(Ordering::SeqCst), 0);

    // the failed record is persisted
    assert_eq!(orchestrator.get_status(run.id).await.unwrap(), run);
}

#[tokio::test]
async fn test_cancel_running_run() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline("sleep 30");
    let (orchestrator, _) = setup(sh_config(dir.path()), &[p.clone()]);

    let run = orchestrator.execute(p.id, &HashMap::new()).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);

    let started = Instant::now();
    let cancelled = orchestrator
        .cancel_run(run.id, Some("no longer needed".to_string()))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(cancelled.status, RunStatus::Failed);
    assert!(cancelled.logs.contains("cancelled"));
    assert!(cancelled.logs.contains("no longer needed"));

    // cancelling again is a no-op
    let again = orchestrator.cancel_run(run.id, None).await.unwrap();
    assert_eq!(again, cancelled);
}

#[tokio::test]
async fn test_logs_stream_while_running() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline("echo early\nsleep 30");
    let (orchestrator, _) = setup(sh_config(dir.path()), &[p.clone()]);

    let run = orchestrator.execute(p.id, &HashMap::new()).await.unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let current = orchestrator.get_status(run.id).await.unwrap();
        assert_eq!(current.status, RunStatus::Running);
        if current.logs.contains("early") {
            break;
        }
        assert!(Instant::now() < deadline, "output was never flushed");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    let cancelled = orchestrator.cancel_run(run.id, None).await.unwrap();
    assert!(cancelled.logs.starts_with("early"));
}

#[tokio::test]
async fn test_maximum_duration_cancels_run() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline("sleep 30");
    let config = sh_config(dir.path()).with_max_run_duration(Duration::from_millis(300));
    let (orchestrator, _) = setup(config, &[p.clone()]);

    let run = orchestrator.execute(p.id, &HashMap::new()).await.unwrap();
    let done = wait_terminal(&orchestrator, run.id).await;

    assert_eq!(done.status, RunStatus::Failed);
    assert!(done.logs.contains("maximum run duration"));
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let p = pipeline("echo $$ > output/pid.txt");
    let (orchestrator, launcher) = setup(sh_config(dir.path()), &[p.clone()]);
    let orchestrator = Arc::new(orchestrator);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let orchestrator = Arc::clone(&orchestrator);
        let id = p.id;
        handles.push(tokio::spawn(async move {
            orchestrator.execute(id, &HashMap::new()).await.unwrap()
        }));
    }

    let mut runs = Vec::new();
    for handle in handles {
        let run = handle.await.unwrap();
        runs.push(wait_terminal(&orchestrator, run.id).await);
    }

    assert_eq!(launcher.calls.load(Ordering::SeqCst), 4);
    for (i, a) in runs.iter().enumerate() {
        assert_eq!(a.status, RunStatus::Completed);
        assert!(a.output_dir.join("pid.txt").is_file());
        for b in &runs[i + 1..] {
            assert_ne!(a.id, b.id);
            assert_ne!(a.workspace_path, b.workspace_path);
            assert_ne!(a.output_dir, b.output_dir);
        }
    }
    assert_eq!(orchestrator.list_runs(p.id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_observed_statuses_are_monotonic() {
    fn rank(status: RunStatus) -> u8 {
        match status {
            RunStatus::Pending => 0,
            RunStatus::Running => 1,
            RunStatus::Completed | RunStatus::Failed => 2,
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let p = pipeline("sleep 0.3\necho done");
    let (orchestrator, _) = setup(sh_config(dir.path()), &[p.clone()]);

    let run = orchestrator.execute(p.id, &HashMap::new()).await.unwrap();
    let mut observed = vec![run.status];
    let deadline = Instant::now() + Duration::from_secs(15);
    loop {
        let current = orchestrator.get_status(run.id).await.unwrap();
        observed.push(current.status);
        if current.is_terminal() {
            break;
        }
        assert!(Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(observed.windows(2).all(|w| rank(w[0]) <= rank(w[1])));
    let last = *observed.last().unwrap();
    assert!(observed.iter().filter(|s| rank(**s) == 2).all(|s| *s == last));
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (orchestrator, _) = setup(sh_config(dir.path()), &[]);
    let id = Uuid::new_v4();

    assert!(matches!(
        orchestrator.get_status(id).await,
        Err(RunError::NotFound(missing)) if missing == id
    ));
    assert!(matches!(
        orchestrator.cancel_run(id, None).await,
        Err(RunError::NotFound(_))
    ));
}
