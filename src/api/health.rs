//! Health check endpoints

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed readiness response
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Serialize)]
pub struct ReadinessChecks {
    pub transcription: CheckResult,
    pub chat: CheckResult,
    pub synthesis: CheckResult,
}

/// Result of a single health check
#[derive(Serialize)]
pub struct CheckResult {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckResult {
    fn from_available(available: bool) -> Self {
        if available {
            Self {
                status: "ok",
                message: None,
            }
        } else {
            Self {
                status: "unavailable",
                message: Some("not configured".to_string()),
            }
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - can a full voice turn succeed?
async fn ready(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<ReadinessResponse>) {
    let processor = &state.processor;
    let checks = ReadinessChecks {
        transcription: CheckResult::from_available(processor.transcriber().is_available()),
        chat: CheckResult::from_available(processor.chat().is_available()),
        synthesis: CheckResult::from_available(processor.synthesizer().is_available()),
    };

    let all_ok = checks.transcription.is_ok() && checks.chat.is_ok() && checks.synthesis.is_ok();
    let (http_status, status) = if all_ok {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (http_status, Json(ReadinessResponse { status, checks }))
}

/// System status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub model: String,
    pub active_sessions: usize,
}

/// Get system status
async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        model: state.model.clone(),
        active_sessions: state.sessions.len().await,
    })
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Build readiness router (needs state for checks)
pub fn ready_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .route("/api/status", get(status))
        .with_state(state)
}
