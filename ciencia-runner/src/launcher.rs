//! Engine process launcher
//!
//! Builds the engine invocation for a workspace and starts it as a child
//! process. Launching never waits for the process: the returned handle owns
//! the child and its output pipes, and whoever holds it observes completion.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::info;

use crate::config::EngineConfig;
use crate::error::LaunchError;
use crate::params::EngineParams;
use crate::workspace::Workspace;

/// A live engine process
///
/// Exactly one handle exists per process; it is moved into the run's watcher.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    process_id: Option<u32>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl ProcessHandle {
    /// Wraps a spawned child, taking ownership of its stdout/stderr pipes
    pub fn new(mut child: Child) -> Self {
        let process_id = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        Self {
            child,
            process_id,
            stdout,
            stderr,
        }
    }

    pub fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    /// Takes the stdout stream for incremental reading
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Takes the stderr stream for incremental reading
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.stderr.take()
    }

    /// Signals the process to terminate without waiting for it
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    pub fn into_child(self) -> Child {
        self.child
    }
}

/// Starts engine processes
///
/// Trait-based so the orchestrator can be exercised with substitute launchers.
pub trait ProcessLauncher: Send + Sync {
    /// Starts the engine for a prepared workspace
    ///
    /// Must return as soon as the process is spawned.
    fn launch(
        &self,
        workspace: &Workspace,
        params: &EngineParams,
    ) -> Result<ProcessHandle, LaunchError>;
}

/// Launches the configured external engine
pub struct EngineLauncher {
    config: Arc<EngineConfig>,
}

impl EngineLauncher {
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self { config }
    }

    /// Builds the argument list passed to the engine executable
    ///
    /// `<engine_args…> <script> [<work_dir_flag> <output_dir>]`
    /// `[<run_name_flag> run_<id>] --k v …`
    pub fn build_args(&self, workspace: &Workspace, params: &EngineParams) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .config
            .engine_args
            .iter()
            .map(OsString::from)
            .collect();

        args.push(workspace.script_path().into_os_string());

        if let Some(flag) = &self.config.work_dir_flag {
            args.push(OsString::from(flag));
            args.push(workspace.output_dir.clone().into_os_string());
        }

        if let Some(flag) = &self.config.run_name_flag {
            args.push(OsString::from(flag));
            args.push(OsString::from(workspace.run_name()));
        }

        args.extend(params.to_args().into_iter().map(OsString::from));
        args
    }

    fn build_command(&self, workspace: &Workspace, params: &EngineParams) -> Command {
        let mut command = Command::new(&self.config.executable);
        command
            .args(self.build_args(workspace, params))
            .current_dir(&workspace.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl ProcessLauncher for EngineLauncher {
    fn launch(
        &self,
        workspace: &Workspace,
        params: &EngineParams,
    ) -> Result<ProcessHandle, LaunchError> {
        let executable = self.config.executable.clone();

        let child = self
            .build_command(workspace, params)
            .spawn()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => LaunchError::NotFound {
                    executable: executable.clone(),
                },
                _ => LaunchError::Spawn {
                    executable: executable.clone(),
                    source,
                },
            })?;

        let mut handle = ProcessHandle::new(child);
        if handle.stdout.is_none() || handle.stderr.is_none() {
            let _ = handle.start_kill();
            let pipe = if handle.stdout.is_none() { "stdout" } else { "stderr" };
            return Err(LaunchError::MissingPipe(pipe));
        }

        info!(
            "Launched {} (pid {:?}) in {}",
            executable.display(),
            handle.process_id(),
            workspace.root.display()
        );

        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workspace::WorkspaceManager;
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::io::AsyncReadExt;
    use uuid::Uuid;

    fn workspace() -> Workspace {
        WorkspaceManager::new("/runs").unwrap().path_for(Uuid::nil())
    }

    #[test]
    fn test_default_invocation_shape() {
        let launcher = EngineLauncher::new(Arc::new(EngineConfig::default()));
        let ws = workspace();
        let mut map = HashMap::new();
        map.insert("genome".to_string(), json!("GRCh38"));
        let params = EngineParams::from_json(&map, &[]).unwrap();

        let args = launcher.build_args(&ws, &params);
        let expected: Vec<OsString> = vec![
            "run".into(),
            ws.script_path().into_os_string(),
            "-work-dir".into(),
            ws.output_dir.clone().into_os_string(),
            "-name".into(),
            format!("run_{}", Uuid::nil()).into(),
            "--genome".into(),
            "GRCh38".into(),
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn test_invocation_without_work_dir_flag() {
        let mut config = EngineConfig::new("sh", "/runs");
        config.engine_args.clear();
        config.work_dir_flag = None;
        config.run_name_flag = None;
        let launcher = EngineLauncher::new(Arc::new(config));
        let ws = workspace();

        let args = launcher.build_args(&ws, &EngineParams::default());
        assert_eq!(args, vec![ws.script_path().into_os_string()]);
    }

    #[tokio::test]
    async fn test_launch_missing_executable() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path()).unwrap();
        let ws = manager.create_workspace(Uuid::new_v4()).await.unwrap();

        let config = EngineConfig::new("definitely-not-a-real-engine-binary", tmp.path());
        let launcher = EngineLauncher::new(Arc::new(config));

        let err = launcher.launch(&ws, &EngineParams::default()).unwrap_err();
        assert!(matches!(err, LaunchError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_launch_exposes_pid_and_streams() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path()).unwrap();
        let ws = manager.create_workspace(Uuid::new_v4()).await.unwrap();
        manager
            .write_script(&ws, "echo out-line\necho err-line >&2\n")
            .await
            .unwrap();

        let mut config = EngineConfig::new("sh", tmp.path());
        config.engine_args.clear();
        config.work_dir_flag = None;
        config.run_name_flag = None;
        let launcher = EngineLauncher::new(Arc::new(config));

        let mut handle = launcher.launch(&ws, &EngineParams::default()).unwrap();
        assert!(handle.process_id().is_some());

        let mut stdout = handle.take_stdout().unwrap();
        let mut stderr = handle.take_stderr().unwrap();
        assert!(handle.take_stdout().is_none());

        let mut out = String::new();
        stdout.read_to_string(&mut out).await.unwrap();
        let mut err = String::new();
        stderr.read_to_string(&mut err).await.unwrap();

        let status = handle.into_child().wait().await.unwrap();
        assert!(status.success());
        assert_eq!(out.trim(), "out-line");
        assert_eq!(err.trim(), "err-line");
    }
}
