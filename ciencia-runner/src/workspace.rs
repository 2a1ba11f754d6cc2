//! Run workspaces
//!
//! Every run gets a private directory derived from its id:
//!
//! ```text
//! <runs_dir>/run_<id>/main.nf   the pipeline script, written verbatim
//! <runs_dir>/run_<id>/output/   working/result root handed to the engine
//! ```
//!
//! The layout is what the engine invocation relies on. Workspaces are never
//! reused and never cleaned up here.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::error::WorkspaceError;

/// Fixed name of the script file inside a workspace
pub const SCRIPT_FILE_NAME: &str = "main.nf";

/// Name of the engine's output subdirectory
pub const OUTPUT_DIR_NAME: &str = "output";

/// Paths of one run's workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub run_id: Uuid,
    pub root: PathBuf,
    pub output_dir: PathBuf,
}

impl Workspace {
    pub fn script_path(&self) -> PathBuf {
        self.root.join(SCRIPT_FILE_NAME)
    }

    /// Name of the run's directory, also used to label the engine run
    pub fn run_name(&self) -> String {
        format!("run_{}", self.run_id)
    }
}

/// Allocates workspaces under a single runs directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Creates a manager rooted at `root`, made absolute against the current
    /// directory. Nothing is created on disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let root = root.into();
        let root = std::path::absolute(&root).map_err(|source| WorkspaceError::Io {
            action: "resolve runs directory",
            path: root.clone(),
            source,
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The stable location of a run's workspace
    pub fn path_for(&self, run_id: Uuid) -> Workspace {
        let root = self.root.join(format!("run_{}", run_id));
        let output_dir = root.join(OUTPUT_DIR_NAME);
        Workspace {
            run_id,
            root,
            output_dir,
        }
    }

    /// Creates the workspace directory tree for a run
    ///
    /// Fails with `AlreadyExists` rather than touching an existing directory.
    pub async fn create_workspace(&self, run_id: Uuid) -> Result<Workspace, WorkspaceError> {
        let workspace = self.path_for(run_id);

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::Io {
                action: "create runs directory",
                path: self.root.clone(),
                source,
            })?;

        tokio::fs::create_dir(&workspace.root)
            .await
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => WorkspaceError::AlreadyExists {
                    path: workspace.root.clone(),
                },
                _ => WorkspaceError::Io {
                    action: "create",
                    path: workspace.root.clone(),
                    source,
                },
            })?;

        tokio::fs::create_dir(&workspace.output_dir)
            .await
            .map_err(|source| WorkspaceError::Io {
                action: "create",
                path: workspace.output_dir.clone(),
                source,
            })?;

        debug!("Created workspace {}", workspace.root.display());
        Ok(workspace)
    }

    /// Writes the pipeline script verbatim into the workspace
    pub async fn write_script(
        &self,
        workspace: &Workspace,
        script: &str,
    ) -> Result<PathBuf, WorkspaceError> {
        let path = workspace.script_path();

        tokio::fs::write(&path, script)
            .await
            .map_err(|source| WorkspaceError::Io {
                action: "write script",
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_is_derived_from_run_id() {
        let manager = WorkspaceManager::new("/srv/runs").unwrap();
        let id = Uuid::new_v4();
        let ws = manager.path_for(id);

        assert_eq!(ws.root, PathBuf::from(format!("/srv/runs/run_{}", id)));
        assert_eq!(ws.output_dir, ws.root.join("output"));
        assert_eq!(ws.script_path(), ws.root.join("main.nf"));
        assert_eq!(ws.run_id, id);
        assert!(ws.root.ends_with(ws.run_name()));
        assert_eq!(manager.path_for(id), ws);
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let manager = WorkspaceManager::new("runs").unwrap();
        assert!(manager.root().is_absolute());
        assert!(manager.root().ends_with("runs"));
    }

    #[tokio::test]
    async fn test_create_workspace_builds_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path().join("runs")).unwrap();

        let ws = manager.create_workspace(Uuid::new_v4()).await.unwrap();
        assert!(ws.root.is_dir());
        assert!(ws.output_dir.is_dir());
    }

    #[tokio::test]
    async fn test_create_workspace_refuses_existing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path()).unwrap();
        let id = Uuid::new_v4();

        let ws = manager.create_workspace(id).await.unwrap();
        std::fs::write(ws.output_dir.join("result.txt"), "keep me").unwrap();

        let err = manager.create_workspace(id).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists { .. }));
        assert_eq!(
            std::fs::read_to_string(ws.output_dir.join("result.txt")).unwrap(),
            "keep me"
        );
    }

    #[tokio::test]
    async fn test_create_workspace_fails_when_root_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("runs");
        std::fs::write(&blocker, "not a directory").unwrap();

        let manager = WorkspaceManager::new(&blocker).unwrap();
        let err = manager.create_workspace(Uuid::new_v4()).await.unwrap_err();
        assert!(err.to_string().contains("workspace"));
    }

    #[tokio::test]
    async fn test_write_script_is_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path()).unwrap();
        let ws = manager.create_workspace(Uuid::new_v4()).await.unwrap();

        let script = "#!/usr/bin/env nextflow\nprocess A {\n  script:\n  \"echo hi\"\n}\n";
        let path = manager.write_script(&ws, script).await.unwrap();

        assert_eq!(path, ws.script_path());
        assert_eq!(std::fs::read_to_string(path).unwrap(), script);
    }

    #[tokio::test]
    async fn test_distinct_runs_get_distinct_workspaces() {
        let tmp = tempfile::tempdir().unwrap();
        let manager = WorkspaceManager::new(tmp.path()).unwrap();

        let a = manager.create_workspace(Uuid::new_v4()).await.unwrap();
        let b = manager.create_workspace(Uuid::new_v4()).await.unwrap();
        assert_ne!(a.root, b.root);
        assert_ne!(a.output_dir, b.output_dir);
    }
}
