use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;

use api::AppState;
use config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ciencia_orchestrator=debug,ciencia_runner=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CiencIA Orchestrator...");

    let config = ServerConfig::from_env().context("Invalid configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Engine: {} (runs in {})",
        config.engine.executable.display(),
        config.engine.runs_dir.display()
    );

    let state = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(database_url)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            AppState::postgres(pool, config.engine.clone())?
        }
        None => {
            tracing::warn!("DATABASE_URL not set, state will not survive a restart");
            AppState::in_memory(config.engine.clone())?
        }
    };

    // Runs left behind by a previous process can no longer be observed
    let reconciled = state
        .runs
        .reconcile_orphans()
        .await
        .context("Failed to reconcile orphaned runs")?;
    if reconciled > 0 {
        tracing::info!("Reconciled {} orphaned run(s)", reconciled);
    }

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
