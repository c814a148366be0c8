//! API error responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors returned by API handlers
#[derive(Debug)]
pub enum ApiError {
    NotConfigured(&'static str),
    BadRequest(&'static str),
    NotFound(String),
    TranscriptionFailed(String),
    SynthesisFailed(String),
    Internal(String),
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::SessionNotFound(id) => Self::NotFound(format!("session not found: {id}")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::TranscriptionFailed(msg) => (StatusCode::BAD_GATEWAY, "transcription_failed", msg),
            Self::SynthesisFailed(msg) => (StatusCode::BAD_GATEWAY, "synthesis_failed", msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal API error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", msg)
            }
        };

        (status, Json(ErrorResponse { error: ErrorBody { code, message } })).into_response()
    }
}
