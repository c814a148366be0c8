//! Standalone speech-to-text and text-to-speech endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiState};
use crate::voice::{AudioInput, extension_for_mime};

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/synthesize", post(synthesize))
        .route("/capabilities", get(capabilities))
        .with_state(state)
}

/// Voice capabilities response
#[derive(Debug, Serialize)]
pub struct VoiceCapabilities {
    pub stt_available: bool,
    pub tts_available: bool,
    pub chat_available: bool,
}

/// Get voice capabilities
async fn capabilities(State(state): State<Arc<ApiState>>) -> Json<VoiceCapabilities> {
    let processor = &state.processor;
    Json(VoiceCapabilities {
        stt_available: processor.transcriber().is_available(),
        tts_available: processor.synthesizer().is_available(),
        chat_available: processor.chat().is_available(),
    })
}

/// Build an upload handle from a request body, named after its content type
pub(crate) fn audio_from_body(headers: &HeaderMap, body: Bytes) -> Option<AudioInput> {
    if body.is_empty() {
        return None;
    }

    let ext = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or("wav", extension_for_mime);

    Some(AudioInput::from_bytes(body.to_vec(), format!("audio.{ext}")))
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe audio to text
///
/// Accepts raw audio; the format is taken from `Content-Type`
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let transcriber = state.processor.transcriber();
    if !transcriber.is_available() {
        return Err(ApiError::NotConfigured("STT not configured"));
    }

    let audio = audio_from_body(&headers, body).ok_or(ApiError::BadRequest("Empty audio data"))?;

    let text = transcriber
        .transcribe(&audio)
        .await
        .map_err(|e| ApiError::TranscriptionFailed(e.to_string()))?;

    Ok(Json(TranscribeResponse {
        text: text.trim().to_string(),
    }))
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// Synthesize text to speech
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    let synthesizer = state.processor.synthesizer();
    if !synthesizer.is_available() {
        return Err(ApiError::NotConfigured("TTS not configured"));
    }

    if request.text.trim().is_empty() {
        return Err(ApiError::BadRequest("Empty text"));
    }

    let clip = synthesizer
        .synthesize(&request.text)
        .await
        .map_err(|e| ApiError::SynthesisFailed(e.to_string()))?;
    let audio = clip.read().await.map_err(ApiError::from)?;

    Ok((StatusCode::OK, [(header::CONTENT_TYPE, clip.mime_type())], audio).into_response())
}
