//! HTTP handlers
//!
//! Request/response DTOs and the REST surface of the control plane. The
//! plane surfaces its own errors as HTTP status codes plus a JSON
//! `{error, detail}` body; worker-side failures never appear here, they
//! travel the event stream.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use oats_core::AgentEvent;

use crate::orchestrator::OrchestratorError;
use crate::state::AppState;

/// POST /investigate request body.
#[derive(Debug, Deserialize)]
pub struct InvestigateRequest {
    pub goal: String,
    #[serde(default)]
    pub target_namespace: Option<String>,
    #[serde(default)]
    pub turn_budget: Option<u32>,
}

/// POST /investigate response body.
#[derive(Debug, Serialize)]
pub struct InvestigateResponse {
    pub investigation_id: String,
    pub job_name: String,
    pub log_stream_hint: String,
}

/// GET /investigations/{id} response body.
#[derive(Debug, Serialize)]
pub struct InvestigationStatusResponse {
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub terminal_at: Option<DateTime<Utc>>,
}

/// GET /investigations/{id}/logs response body.
#[derive(Debug, Serialize)]
pub struct InvestigationLogsResponse {
    pub investigation_id: String,
    pub events: Vec<AgentEvent>,
}

/// Error envelope for every non-2xx response.
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "bad_request",
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "not_found",
            detail: detail.into(),
        }
    }

    pub fn orchestrator_unavailable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            error: "orchestrator_unavailable",
            detail: detail.into(),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(error: OrchestratorError) -> Self {
        match error {
            OrchestratorError::NotFound(detail) => Self::not_found(detail),
            other => Self::orchestrator_unavailable(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({"error": self.error, "detail": self.detail}));
        (self.status, body).into_response()
    }
}

/// POST /investigate
pub async fn create_investigation(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InvestigateRequest>,
) -> Result<Json<InvestigateResponse>, ApiError> {
    if request.goal.trim().is_empty() {
        return Err(ApiError::bad_request("goal must not be empty"));
    }

    let namespace = request
        .target_namespace
        .filter(|ns| !ns.is_empty())
        .unwrap_or_else(|| state.config.default_namespace.clone());
    let turn_budget = request.turn_budget.unwrap_or(state.config.default_turn_budget);
    if turn_budget == 0 {
        return Err(ApiError::bad_request("turn_budget must be at least 1"));
    }

    info!("New investigation request: {} chars of goal", request.goal.len());

    let investigation = state
        .create_investigation(request.goal, namespace.clone(), turn_budget)
        .await?;

    Ok(Json(InvestigateResponse {
        log_stream_hint: state
            .orchestrator
            .log_stream_hint(&investigation.job_name, &namespace),
        investigation_id: investigation.id,
        job_name: investigation.job_name,
    }))
}

/// GET /investigations/{id}
pub async fn get_investigation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<InvestigationStatusResponse>, ApiError> {
    let investigation = state
        .get(&id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("no investigation '{}'", id)))?;

    Ok(Json(InvestigationStatusResponse {
        state: investigation.state.to_string(),
        created_at: investigation.created_at,
        terminal_at: investigation.terminal_at,
    }))
}

/// GET /investigations/{id}/logs
pub async fn get_investigation_logs(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<InvestigationLogsResponse>, ApiError> {
    let events = state.replay_events(&id).await?;
    Ok(Json(InvestigationLogsResponse {
        investigation_id: id,
        events,
    }))
}

/// DELETE /investigations/{id}
pub async fn delete_investigation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .cancel(&id)
        .await
        .ok_or_else(|| ApiError::not_found(format!("no investigation '{}'", id)))?;

    // Idempotent: cancelling a terminal investigation is a no-op 204.
    Ok(StatusCode::NO_CONTENT)
}

/// GET /healthz
pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy", "service": "oats-server"}))
}
