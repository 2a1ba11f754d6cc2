//! Health Check API Handler
//!
//! Simple health check endpoint for monitoring.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::api::state::AppState;

/// GET /health
/// Health check endpoint, reporting the number of live runs
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "active_runs": state.runs.active_runs(),
    }))
}
