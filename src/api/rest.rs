//! HTTP routes: course generation trigger, job inspection and health.

use crate::api::dto::HealthResponse;
use crate::api::{AdminRequester, AppState};
use crate::error::PipelineError;
use crate::pipeline::{CourseGenerationRequest, JobAck, JobDetail};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{Method, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

const API_BASE: &str = "/api/v1";

/// Build the router with all routes configured
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route(
            format!("{}/courses/generate", API_BASE).as_str(),
            post(generate_course),
        )
        .route(format!("{}/jobs/{{job_id}}", API_BASE).as_str(), get(get_job))
        .route(format!("{}/health", API_BASE).as_str(), get(health_check))
        .with_state(app_state)
        .layer(cors)
}

/// Serve until ctrl-c, then drain the worker pool.
pub async fn start(app_state: AppState, bind_addr: &str) -> Result<(), PipelineError> {
    let app = build_router(app_state.clone());
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|e| PipelineError::Config(format!("Failed to bind {}: {}", bind_addr, e)))?;

    info!(bind = %bind_addr, "REST server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PipelineError::Internal(format!("Server error: {}", e)))?;

    info!("REST server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

async fn generate_course(
    State(state): State<AppState>,
    AdminRequester(requester): AdminRequester,
    body: Bytes,
) -> Result<(StatusCode, Json<JobAck>), PipelineError> {
    let body: Value = serde_json::from_slice(&body).map_err(|_| {
        PipelineError::Validation("Request body must be valid JSON".to_string())
    })?;
    let request = CourseGenerationRequest::from_json(&body)?;
    let ack = state.orchestrator.submit(&requester, request).await?;
    Ok((StatusCode::ACCEPTED, Json(ack)))
}

async fn get_job(
    State(state): State<AppState>,
    AdminRequester(_requester): AdminRequester,
    Path(job_id): Path<String>,
) -> Result<Json<JobDetail>, PipelineError> {
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| PipelineError::Validation(format!("Invalid job id: {}", job_id)))?;
    Ok(Json(state.orchestrator.job_detail(&job_id)?))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
