//! Run Repository
//!
//! Postgres implementation of the runner's `RunStore`. Every lifecycle
//! transition lands here as a single-row `UPDATE`.

use async_trait::async_trait;
use ciencia_core::domain::run::{Run, RunStatus};
use ciencia_runner::{RunStore, StoreError};
use sqlx::PgPool;
use std::collections::HashMap;
use std::path::PathBuf;
use uuid::Uuid;

use super::db_error;

const RUN_COLUMNS: &str = "id, pipeline_id, status, workspace_path, output_dir, process_id, \
                           parameters, logs, created_at, started_at, completed_at";

/// Postgres-backed run storage
#[derive(Clone)]
pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create(&self, run: &Run) -> Result<(), StoreError> {
        let parameters = serde_json::to_value(&run.parameters)
            .map_err(|e| StoreError::Backend(format!("failed to encode parameters: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO pipeline_runs (
                id, pipeline_id, status, workspace_path, output_dir, process_id,
                parameters, logs, created_at, started_at, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(run.id)
        .bind(run.pipeline_id)
        .bind(run.status.as_str())
        .bind(run.workspace_path.to_string_lossy().into_owned())
        .bind(run.output_dir.to_string_lossy().into_owned())
        .bind(run.process_id.map(i64::from))
        .bind(parameters)
        .bind(&run.logs)
        .bind(run.created_at)
        .bind(run.started_at)
        .bind(run.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Run>, StoreError> {
        let query = format!("SELECT {} FROM pipeline_runs WHERE id = $1", RUN_COLUMNS);
        let row = sqlx::query_as::<_, RunRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(Run::try_from).transpose()
    }

    async fn update(&self, run: &Run) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE pipeline_runs
            SET status = $1, process_id = $2, logs = $3, started_at = $4, completed_at = $5
            WHERE id = $6
            "#,
        )
        .bind(run.status.as_str())
        .bind(run.process_id.map(i64::from))
        .bind(&run.logs)
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Backend(format!("run {} does not exist", run.id)));
        }

        Ok(())
    }

    async fn list_by_pipeline(&self, pipeline_id: Uuid) -> Result<Vec<Run>, StoreError> {
        let query = format!(
            "SELECT {} FROM pipeline_runs WHERE pipeline_id = $1 ORDER BY created_at DESC",
            RUN_COLUMNS
        );
        let rows = sqlx::query_as::<_, RunRow>(&query)
            .bind(pipeline_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(Run::try_from).collect()
    }

    async fn list_by_status(&self, status: RunStatus) -> Result<Vec<Run>, StoreError> {
        let query = format!(
            "SELECT {} FROM pipeline_runs WHERE status = $1 ORDER BY created_at ASC",
            RUN_COLUMNS
        );
        let rows = sqlx::query_as::<_, RunRow>(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(Run::try_from).collect()
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunRow {
    id: Uuid,
    pipeline_id: Uuid,
    status: String,
    workspace_path: String,
    output_dir: String,
    process_id: Option<i64>,
    parameters: serde_json::Value,
    logs: String,
    created_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<RunRow> for Run {
    type Error = StoreError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| StoreError::Backend(format!("run {}: {}", row.id, e)))?;
        let parameters: HashMap<String, serde_json::Value> =
            serde_json::from_value(row.parameters).map_err(|e| {
                StoreError::Backend(format!("run {} has invalid parameters: {}", row.id, e))
            })?;

        Ok(Run {
            id: row.id,
            pipeline_id: row.pipeline_id,
            status,
            workspace_path: PathBuf::from(row.workspace_path),
            output_dir: PathBuf::from(row.output_dir),
            process_id: row.process_id.and_then(|pid| u32::try_from(pid).ok()),
            parameters,
            logs: row.logs,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        })
    }
}
