//! Speech-to-text (STT) processing

use async_trait::async_trait;

use super::AudioInput;
use crate::turn::{CollaboratorError, Stage, Transcriber};
use crate::{Error, Result};

/// Groq's OpenAI-compatible API base
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// `OpenAI` API base
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Response from an OpenAI-compatible transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// STT provider backend
#[derive(Clone, Debug)]
enum SttProvider {
    /// `/audio/transcriptions` on an OpenAI-compatible base URL (OpenAI, Groq)
    Whisper { base_url: String },
    Deepgram,
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a Whisper transcriber against an OpenAI-compatible API
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(base_url: String, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "API key required for Whisper transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider: SttProvider::Whisper {
                base_url: base_url.trim_end_matches('/').to_string(),
            },
        })
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_deepgram(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Deepgram API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider: SttProvider::Deepgram,
        })
    }

    /// Transcribe audio to text
    ///
    /// # Errors
    ///
    /// Returns error if the audio cannot be read or transcription fails
    pub async fn transcribe_audio(&self, audio: &AudioInput) -> Result<String> {
        let bytes = audio.read().await?;
        if bytes.is_empty() {
            return Ok(String::new());
        }

        match &self.provider {
            SttProvider::Whisper { base_url } => {
                self.transcribe_whisper(base_url, bytes, &audio.file_name(), audio.mime_type())
                    .await
            }
            SttProvider::Deepgram => self.transcribe_deepgram(bytes, audio.mime_type()).await,
        }
    }

    /// Transcribe using an OpenAI-compatible Whisper endpoint
    async fn transcribe_whisper(
        &self,
        base_url: &str,
        audio: Vec<u8>,
        file_name: &str,
        mime_type: &str,
    ) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), model = %self.model, "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name(file_name.to_string())
                    .mime_str(mime_type)
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{base_url}/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        log_transcript("whisper", &result.text);
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: Vec<u8>, mime_type: &str) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", mime_type)
            .body(audio)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Deepgram request failed");
                e
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            e
        })?;

        let transcript = first_transcript(result);

        log_transcript("deepgram", &transcript);
        Ok(transcript)
    }
}

/// User speech stays out of logs below debug level
fn log_transcript(provider: &'static str, transcript: &str) {
    tracing::info!(provider, chars = transcript.chars().count(), "transcription complete");
    tracing::debug!(provider, transcript = %transcript, "transcribed text");
}

/// Best alternative of the first channel, or empty text
fn first_transcript(response: DeepgramResponse) -> String {
    response
        .results
        .channels
        .into_iter()
        .next()
        .and_then(|c| c.alternatives.into_iter().next())
        .map(|a| a.transcript)
        .unwrap_or_default()
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &AudioInput) -> std::result::Result<String, CollaboratorError> {
        self.transcribe_audio(audio)
            .await
            .map_err(|e| CollaboratorError::failed(Stage::Transcription, e))
    }
}
