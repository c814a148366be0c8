//! Collaborator construction from configuration
//!
//! A missing API key does not stop the gateway from starting. The affected
//! stage is replaced by [`Unconfigured`], which fails every call so the
//! problem shows up in the transcript as a `System Error:` line.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, SttBackend, TtsBackend};
use crate::conversation::Message;
use crate::llm::ChatClient;
use crate::turn::{
    ChatModel, CollaboratorError, Stage, Synthesizer, Transcriber, TurnProcessor,
};
use crate::voice::{AudioClip, AudioInput, SpeechToText, TextToSpeech};
use crate::Result;

/// Stand-in for a collaborator that could not be configured
#[derive(Debug, Clone)]
pub struct Unconfigured {
    stage: Stage,
    reason: String,
}

impl Unconfigured {
    /// Collaborator that always fails at `stage` with `reason`
    pub fn new(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            reason: reason.into(),
        }
    }

    fn error(&self) -> CollaboratorError {
        CollaboratorError::failed(self.stage, &self.reason)
    }
}

#[async_trait]
impl Transcriber for Unconfigured {
    async fn transcribe(&self, _audio: &AudioInput) -> std::result::Result<String, CollaboratorError> {
        Err(self.error())
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[async_trait]
impl ChatModel for Unconfigured {
    async fn complete(&self, _messages: &[Message]) -> std::result::Result<String, CollaboratorError> {
        Err(self.error())
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[async_trait]
impl Synthesizer for Unconfigured {
    async fn synthesize(&self, _text: &str) -> std::result::Result<AudioClip, CollaboratorError> {
        Err(self.error())
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Build the speech-to-text client for the configured backend
///
/// # Errors
///
/// Returns error if the backend's API key is missing
pub fn speech_to_text(config: &Config) -> Result<SpeechToText> {
    let key = config.stt_api_key().unwrap_or_default().to_string();
    let model = config.voice.stt_model.clone();
    match config.voice.stt_provider {
        SttBackend::Groq | SttBackend::OpenAi => {
            SpeechToText::new_whisper(config.voice.stt_base_url.clone(), key, model)
        }
        SttBackend::Deepgram => SpeechToText::new_deepgram(key, model),
    }
}

/// Build the chat client
///
/// # Errors
///
/// Returns error if the chat API key is missing
pub fn chat_client(config: &Config) -> Result<ChatClient> {
    let key = config.chat_api_key().unwrap_or_default().to_string();
    Ok(ChatClient::new(&config.llm.base_url, key, config.llm.model.clone())?
        .with_max_tokens(config.llm.max_tokens))
}

/// Build the text-to-speech client for the configured backend
///
/// # Errors
///
/// Returns error if the backend's API key is missing
pub fn text_to_speech(config: &Config) -> Result<TextToSpeech> {
    let voice = &config.voice;
    match voice.tts_provider {
        TtsBackend::Google => Ok(TextToSpeech::new_google(
            voice.tts_language.clone(),
            voice.tts_speed,
        )),
        TtsBackend::OpenAi => TextToSpeech::new_openai(
            config.api_keys.openai.clone().unwrap_or_default(),
            voice.tts_voice.clone(),
            voice.tts_speed,
            voice.tts_model.clone(),
        ),
        TtsBackend::ElevenLabs => TextToSpeech::new_elevenlabs(
            config.api_keys.elevenlabs.clone().unwrap_or_default(),
            voice.tts_voice.clone(),
            voice.tts_model.clone(),
        ),
    }
}

/// Build a turn processor, substituting [`Unconfigured`] for any stage
/// whose client cannot be created
#[must_use]
pub fn build_processor(config: &Config) -> TurnProcessor {
    let transcriber: Arc<dyn Transcriber> = match speech_to_text(config) {
        Ok(stt) => Arc::new(stt),
        Err(e) => {
            tracing::warn!(error = %e, "speech-to-text unavailable");
            Arc::new(Unconfigured::new(Stage::Transcription, e.to_string()))
        }
    };

    let chat: Arc<dyn ChatModel> = match chat_client(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!(error = %e, "chat completion unavailable");
            Arc::new(Unconfigured::new(Stage::Chat, e.to_string()))
        }
    };

    let synthesizer: Arc<dyn Synthesizer> = match text_to_speech(config) {
        Ok(tts) => Arc::new(tts),
        Err(e) => {
            tracing::warn!(error = %e, "text-to-speech unavailable");
            Arc::new(Unconfigured::new(Stage::Synthesis, e.to_string()))
        }
    };

    TurnProcessor::new(transcriber, chat, synthesizer).with_timeout(config.turn_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::ConfigFile;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::resolve(ConfigFile::default(), |key| {
            vars.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn missing_keys_degrade_to_unconfigured() {
        let processor = build_processor(&config(&[]));

        assert!(!processor.transcriber().is_available());
        assert!(!processor.chat().is_available());
        // Google speech needs no key
        assert!(processor.synthesizer().is_available());
    }

    #[test]
    fn groq_key_enables_stt_and_chat() {
        let processor = build_processor(&config(&[("GROQ_API_KEY", "gsk_test")]));

        assert!(processor.transcriber().is_available());
        assert!(processor.chat().is_available());
    }

    #[tokio::test]
    async fn unconfigured_turn_records_error() {
        let processor = build_processor(&config(&[]));
        let audio = AudioInput::from_bytes(vec![1, 2, 3], "audio.wav");
        let out = processor
            .process_turn(Some(&audio), crate::conversation::TurnMemory::default())
            .await;

        assert!(out.audio.is_none());
        assert_eq!(out.transcript.len(), 1);
        assert!(out.transcript[0].content.starts_with("System Error: transcription failed"));
    }
}
