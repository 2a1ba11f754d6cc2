//! ID resolver module
//!
//! Resolves UUID prefixes to full UUIDs by listing the matching resources,
//! so users can type short, unambiguous prefixes instead of full UUIDs.

use anyhow::{Context, Result, anyhow};
use ciencia_client::CienciaClient;
use uuid::Uuid;

use crate::types::IdOrPrefix;

/// Resolve a project ID or prefix to a full UUID
pub async fn resolve_project_id(client: &CienciaClient, id_or_prefix: &IdOrPrefix) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let projects = client
        .list_projects()
        .await
        .context("Failed to fetch projects for ID resolution")?;

    pick_unique("project", id_or_prefix, projects.iter().map(|p| p.id))
}

/// Resolve a pipeline ID or prefix to a full UUID
///
/// # Errors
/// Returns an error if no pipeline matches, if the prefix is ambiguous or
/// if the listing fails.
pub async fn resolve_pipeline_id(
    client: &CienciaClient,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let pipelines = client
        .list_pipelines(None)
        .await
        .context("Failed to fetch pipelines for ID resolution")?;

    pick_unique("pipeline", id_or_prefix, pipelines.iter().map(|p| p.id))
}

/// Resolve a run ID or prefix
///
/// Runs are only listed per pipeline, so a prefix needs the owning pipeline.
pub async fn resolve_run_id(
    client: &CienciaClient,
    pipeline: Option<&IdOrPrefix>,
    id_or_prefix: &IdOrPrefix,
) -> Result<Uuid> {
    if let Some(uuid) = id_or_prefix.as_uuid() {
        return Ok(uuid);
    }

    let pipeline = pipeline.ok_or_else(|| {
        anyhow!(
            "Run prefix '{}' needs --pipeline, or pass the full run ID",
            id_or_prefix
        )
    })?;
    let pipeline_id = resolve_pipeline_id(client, pipeline).await?;

    let runs = client
        .list_pipeline_runs(pipeline_id)
        .await
        .context("Failed to fetch pipeline runs for ID resolution")?;

    pick_unique("run", id_or_prefix, runs.iter().map(|r| r.id))
        .with_context(|| format!("in pipeline {}", pipeline_id))
}

fn pick_unique(
    kind: &str,
    id_or_prefix: &IdOrPrefix,
    candidates: impl Iterator<Item = Uuid>,
) -> Result<Uuid> {
    let matches: Vec<Uuid> = candidates.filter(|id| id_or_prefix.matches(id)).collect();

    match matches.as_slice() {
        [] => Err(anyhow!(
            "No {} found with ID starting with '{}'",
            kind,
            id_or_prefix
        )),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple {}s: {}",
                id_or_prefix,
                kind,
                ids.join(", ")
            ))
        }
    }
}
