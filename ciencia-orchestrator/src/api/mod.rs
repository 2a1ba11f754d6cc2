//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod pipeline;
pub mod project;
pub mod run;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use state::AppState;

/// Create the main router: `/health` plus every endpoint under `/api`
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Project endpoints
        .route("/project/create", post(project::create_project))
        .route("/project/list", get(project::list_projects))
        .route(
            "/project/{id}",
            get(project::get_project).delete(project::delete_project),
        )
        // Pipeline endpoints
        .route("/pipeline/create", post(pipeline::create_pipeline))
        .route("/pipeline/list", get(pipeline::list_pipelines))
        .route(
            "/pipeline/{id}",
            get(pipeline::get_pipeline)
                .put(pipeline::update_pipeline)
                .delete(pipeline::delete_pipeline),
        )
        .route("/pipeline/{id}/execute", post(run::execute_pipeline))
        .route("/pipeline/{id}/runs", get(run::list_pipeline_runs))
        // Run endpoints
        .route("/run/{id}", get(run::get_run))
        .route("/run/{id}/cancel", post(run::cancel_run));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", api)
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use ciencia_runner::EngineConfig;
    use serde_json::{Value, json};
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    fn test_app(runs_dir: &std::path::Path) -> Router {
        let mut engine = EngineConfig::new("sh", runs_dir);
        engine.engine_args.clear();
        engine.work_dir_flag = None;
        engine.run_name_flag = None;
        engine.log_flush_interval = Duration::from_millis(50);
        engine.cancel_grace = Duration::from_secs(5);

        create_router(AppState::in_memory(engine).unwrap())
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        (status, value)
    }

    async fn create_pipeline(app: &Router, script: &str) -> (String, String) {
        let (status, project) = send(
            app,
            "POST",
            "/api/project/create",
            Some(json!({"name": "Genomics", "description": "test project"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let project_id = project["id"].as_str().unwrap().to_string();

        let (status, pipeline) = send(
            app,
            "POST",
            "/api/pipeline/create",
            Some(json!({"project_id": project_id, "name": "qc", "script": script})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pipeline["status"], "draft");

        (project_id, pipeline["id"].as_str().unwrap().to_string())
    }

    async fn wait_terminal(app: &Router, run_id: &str) -> Value {
        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            let (status, run) = send(app, "GET", &format!("/api/run/{}", run_id), None).await;
            assert_eq!(status, StatusCode::OK);
            if run["status"] == "completed" || run["status"] == "failed" {
                return run;
            }
            assert!(Instant::now() < deadline, "run never finished");
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_runs"], 0);
    }

    #[tokio::test]
    async fn test_execute_and_follow_run() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        let (_, pipeline_id) = create_pipeline(&app, "echo hello").await;

        let (status, response) = send(
            &app,
            "POST",
            &format!("/api/pipeline/{}/execute", pipeline_id),
            Some(json!({"params": {"sample": "S1"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(response["status"] == "running" || response["status"] == "completed");
        assert!(response["message"].as_str().unwrap().contains("Run ID"));

        let run_id = response["run_id"].as_str().unwrap().to_string();
        let run = wait_terminal(&app, &run_id).await;
        assert_eq!(run["status"], "completed");
        assert!(run["logs"].as_str().unwrap().contains("hello"));
        assert!(run["output_dir"].as_str().unwrap().ends_with("output"));
        assert!(!run["completed_at"].is_null());

        let (status, runs) = send(
            &app,
            "GET",
            &format!("/api/pipeline/{}/runs", pipeline_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(runs.as_array().unwrap().len(), 1);
        assert_eq!(runs[0]["id"], run_id.as_str());
    }

    #[tokio::test]
    async fn test_failed_setup_is_reported_in_response() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("runs");
        std::fs::write(&blocker, "file").unwrap();
        let app = test_app(&blocker);
        let (_, pipeline_id) = create_pipeline(&app, "echo never").await;

        let (status, response) = send(
            &app,
            "POST",
            &format!("/api/pipeline/{}/execute", pipeline_id),
            Some(json!({"params": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["status"], "failed");
        assert!(response["message"].as_str().unwrap().contains("workspace"));
    }

    #[tokio::test]
    async fn test_not_found_and_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        let missing = uuid::Uuid::new_v4();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/pipeline/{}/execute", missing),
            Some(json!({"params": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("not found"));

        let (status, _) = send(&app, "GET", &format!("/api/run/{}", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "POST", &format!("/api/run/{}/cancel", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, pipeline_id) = create_pipeline(&app, "echo hi").await;
        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/pipeline/{}/execute", pipeline_id),
            Some(json!({"params": {"resume": true}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("reserved"));

        let (status, _) = send(
            &app,
            "POST",
            "/api/pipeline/create",
            Some(json!({"project_id": missing, "name": "x", "script": "echo"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_running_run() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        let (_, pipeline_id) = create_pipeline(&app, "sleep 30").await;

        let (_, response) = send(
            &app,
            "POST",
            &format!("/api/pipeline/{}/execute", pipeline_id),
            Some(json!({"params": {}})),
        )
        .await;
        assert_eq!(response["status"], "running");
        let run_id = response["run_id"].as_str().unwrap().to_string();

        // the pipeline cannot be deleted while its run is active
        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/pipeline/{}", pipeline_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, cancelled) = send(
            &app,
            "POST",
            &format!("/api/run/{}/cancel?reason=stop", run_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["status"], "failed");

        let (_, run) = send(&app, "GET", &format!("/api/run/{}", run_id), None).await;
        assert!(run["logs"].as_str().unwrap().contains("run cancelled: stop"));

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/pipeline/{}", pipeline_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_project_and_pipeline_management() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(dir.path());
        let (project_id, pipeline_id) = create_pipeline(&app, "echo v1").await;

        let (status, _) = send(&app, "DELETE", &format!("/api/project/{}", project_id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, updated) = send(
            &app,
            "PUT",
            &format!("/api/pipeline/{}", pipeline_id),
            Some(json!({"script": "echo v2", "status": "validated"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["script"], "echo v2");
        assert_eq!(updated["status"], "validated");
        assert_eq!(updated["name"], "qc");

        let (_, listed) = send(
            &app,
            "GET",
            &format!("/api/pipeline/list?project_id={}", project_id),
            None,
        )
        .await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert!(listed[0].get("script").is_none());

        let (_, listed) = send(
            &app,
            "GET",
            &format!("/api/pipeline/list?project_id={}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert!(listed.as_array().unwrap().is_empty());

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/pipeline/{}", pipeline_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/api/project/{}", project_id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, projects) = send(&app, "GET", "/api/project/list", None).await;
        assert!(projects.as_array().unwrap().is_empty());
    }
}
