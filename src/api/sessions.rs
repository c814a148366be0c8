//! Conversation session endpoints
//!
//! - `POST /api/sessions` opens a session
//! - `POST /api/sessions/{id}/turns` submits recorded audio (empty body = no input)
//! - `GET /api/sessions/{id}/audio` fetches the reply clip once
//! - `POST /api/sessions/{id}/reset` clears the conversation

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use uuid::Uuid;

use super::voice::audio_from_body;
use super::{ApiError, ApiState};
use crate::conversation::Message;
use crate::session::TurnView;

/// Build session router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", post(create_session))
        .route("/{id}", get(get_session).delete(delete_session))
        .route("/{id}/turns", post(submit_turn))
        .route("/{id}/audio", get(fetch_audio))
        .route("/{id}/reset", post(reset_session))
        .with_state(state)
}

/// Session transcript response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub transcript: Vec<Message>,
}

/// Turn or reset response
#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub session_id: Uuid,
    pub transcript: Vec<Message>,
    /// Where to fetch the spoken reply, if one was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    pub clear_input: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TurnResponse {
    fn new(session_id: Uuid, view: TurnView) -> Self {
        let error = match &view.outcome {
            crate::turn::TurnOutcome::Failed(e) => Some(e.to_string()),
            _ => None,
        };
        Self {
            session_id,
            audio_url: view
                .has_audio
                .then(|| format!("/api/sessions/{session_id}/audio")),
            transcript: view.transcript,
            clear_input: view.clear_input,
            outcome: view.outcome.as_str(),
            error,
        }
    }
}

/// Open a new session
async fn create_session(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<SessionResponse>) {
    let (session_id, session) = state.sessions.create().await;
    let session = session.lock().await;

    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id,
            created_at: session.created_at(),
            transcript: session.transcript(),
        }),
    )
}

/// Get the current transcript
async fn get_session(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sessions.lock(id).await?;

    Ok(Json(SessionResponse {
        session_id: id,
        created_at: session.created_at(),
        transcript: session.transcript(),
    }))
}

/// Drop a session and any pending audio
async fn delete_session(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("session not found: {id}")))
    }
}

/// Run one voice turn
///
/// Turns for the same session wait for each other and apply in order.
async fn submit_turn(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TurnResponse>, ApiError> {
    let audio = audio_from_body(&headers, body);

    let mut session = state.sessions.lock(id).await?;
    let view = session.run_turn(&state.processor, audio.as_ref()).await;

    Ok(Json(TurnResponse::new(id, view)))
}

/// Fetch the last reply clip; a second fetch returns 404
async fn fetch_audio(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let clip = state
        .sessions
        .lock(id)
        .await?
        .take_audio()
        .ok_or_else(|| ApiError::NotFound("no audio pending".to_string()))?;

    let audio = clip.read().await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, clip.mime_type()),
            (header::CACHE_CONTROL, "no-store"),
        ],
        audio,
    )
        .into_response())
}

/// Reset the conversation to its hidden directive
async fn reset_session(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TurnResponse>, ApiError> {
    let view = state.sessions.lock(id).await?.reset();

    Ok(Json(TurnResponse::new(id, view)))
}
