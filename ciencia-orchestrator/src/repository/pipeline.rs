//! Pipeline Repository
//!
//! Handles all database operations related to pipelines.

use async_trait::async_trait;
use ciencia_core::domain::pipeline::{Pipeline, PipelineStatus};
use ciencia_runner::{PipelineSource, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use super::{PipelineDeletion, PipelineRepository, db_error};

/// Postgres-backed pipeline storage
#[derive(Clone)]
pub struct PgPipelineRepository {
    pool: PgPool,
}

impl PgPipelineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineRepository for PgPipelineRepository {
    async fn create(&self, pipeline: &Pipeline) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pipelines (id, project_id, name, script, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(pipeline.id)
        .bind(pipeline.project_id)
        .bind(&pipeline.name)
        .bind(&pipeline.script)
        .bind(pipeline.status.as_str())
        .bind(pipeline.created_at)
        .bind(pipeline.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        let row = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, project_id, name, script, status, created_at, updated_at
            FROM pipelines
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(|r| r.into()))
    }

    async fn list(&self, project_id: Option<Uuid>) -> Result<Vec<Pipeline>, StoreError> {
        let rows = sqlx::query_as::<_, PipelineRow>(
            r#"
            SELECT id, project_id, name, script, status, created_at, updated_at
            FROM pipelines
            WHERE $1::uuid IS NULL OR project_id = $1
            ORDER BY updated_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update(&self, pipeline: &Pipeline) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE pipelines
            SET name = $1, script = $2, status = $3, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(&pipeline.name)
        .bind(&pipeline.script)
        .bind(pipeline.status.as_str())
        .bind(pipeline.updated_at)
        .bind(pipeline.id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid) -> Result<PipelineDeletion, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Run inserts take a key-share lock on the pipeline row, so holding
        // it here keeps new runs out until the transaction ends
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM pipelines WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
        if locked.is_none() {
            return Ok(PipelineDeletion::NotFound);
        }

        let active: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM pipeline_runs
            WHERE pipeline_id = $1 AND status IN ('pending', 'running')
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        if active > 0 {
            return Ok(PipelineDeletion::ActiveRuns(active as u64));
        }

        sqlx::query("DELETE FROM pipeline_runs WHERE pipeline_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        sqlx::query("DELETE FROM pipelines WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(PipelineDeletion::Deleted)
    }

    async fn count_by_project(&self, project_id: Uuid) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pipelines WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl PipelineSource for PgPipelineRepository {
    async fn get_pipeline(&self, id: Uuid) -> Result<Option<Pipeline>, StoreError> {
        self.find_by_id(id).await
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    project_id: Uuid,
    name: String,
    script: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PipelineRow> for Pipeline {
    fn from(row: PipelineRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|e| {
            tracing::warn!("Pipeline {} has {}, treating it as draft", row.id, e);
            PipelineStatus::Draft
        });

        Pipeline {
            id: row.id,
            project_id: row.project_id,
            name: row.name,
            script: row.script,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
