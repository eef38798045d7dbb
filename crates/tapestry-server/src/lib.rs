//! Tapestry Server Library
//!
//! On-demand HTTP trigger surface for the ingestion pipelines.
//!
//! # Overview
//!
//! - `GET /` — service banner
//! - `GET /health` — database connectivity check
//! - `GET /api/sources` — the registered source names
//! - `POST /api/ingest/:source` — run one source's pipeline to
//!   completion and return its run summary; accepts an optional JSON
//!   body `{"query": "..."}` for a spot-check run
//!
//! Scheduled full runs belong to the `tapestry-ingest` binary; this
//! server exists for operators poking at a single source.

pub mod aws;
pub mod config;
pub mod error;
pub mod middleware;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use tapestry_ingest::orchestrator::Orchestrator;
use tapestry_ingest::pipeline::RunSummary;
use tapestry_ingest::source::RunParams;

use crate::config::Config;

// Re-export commonly used types
pub use error::{AppError, ServerResult};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub orchestrator: Arc<Orchestrator>,
}

/// Optional trigger body for a spot-check run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TriggerRequest {
    pub query: Option<String>,
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let rate_limit = middleware::RateLimitConfig::from_env();
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit.replenish_interval_ms())
            .burst_size(rate_limit.burst_size())
            .finish()
            .unwrap(),
    );
    let rate_limit = GovernorLayer {
        config: governor_conf,
    };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/sources", get(list_sources))
        .route(
            "/api/ingest/:source",
            post(trigger_ingest).layer(rate_limit),
        )
        .with_state(state)
        .layer(middleware::trace_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Service banner
async fn root() -> &'static str {
    "Tapestry metadata ingestion service is running."
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Result<Response, StatusCode> {
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        },
    }
}

/// The registered sources, in run order
async fn list_sources(State(state): State<AppState>) -> impl IntoResponse {
    let sources: Vec<String> = state
        .orchestrator
        .source_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    Json(json!({ "sources": sources }))
}

/// Run one source's pipeline and return its summary
async fn trigger_ingest(
    State(state): State<AppState>,
    Path(source): Path<String>,
    body: Option<Json<TriggerRequest>>,
) -> ServerResult<Json<RunSummary>> {
    let params = RunParams {
        query: body.and_then(|Json(b)| b.query),
    };

    tracing::info!(source = %source, query = ?params.query, "ingestion triggered via API");

    let summary = state.orchestrator.run_source(&source, &params).await?;
    Ok(Json(summary))
}
