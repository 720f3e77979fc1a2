//! HTTP surface: generation trigger, job inspection and health.

pub mod dto;
pub mod rest;

pub use rest::{build_router, start};

use crate::auth::{bearer_token, require_admin, Authorizer, Requester};
use crate::error::PipelineError;
use crate::pipeline::PipelineOrchestrator;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dto::ErrorResponse;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub authorizer: Arc<dyn Authorizer>,
}

impl AppState {
    pub fn new(orchestrator: Arc<PipelineOrchestrator>, authorizer: Arc<dyn Authorizer>) -> Self {
        Self {
            orchestrator,
            authorizer,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let message = match &self {
            PipelineError::Internal(_) | PipelineError::Config(_) => {
                warn!(error = %self, "Request failed with an internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: message,
            code: self.code().to_string(),
            status: "error".to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Requester resolved from the bearer token and checked for the admin role.
pub struct AdminRequester(pub Requester);

impl FromRequestParts<AppState> for AdminRequester {
    type Rejection = PipelineError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        let token = bearer_token(header)?;
        let requester = state.authorizer.resolve(token).await?;
        require_admin(&requester)?;
        Ok(AdminRequester(requester))
    }
}
