//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vocafree_gateway::turn::{
    ChatModel, CollaboratorError, Stage, Synthesizer, Transcriber, TurnProcessor,
};
use vocafree_gateway::{AudioClip, AudioInput, Message};

pub const DIRECTIVE: &str = "You are a test assistant.";

/// Transcriber that returns scripted results in order, repeating the last
pub struct ScriptedTranscriber {
    replies: Mutex<Vec<Result<String, CollaboratorError>>>,
}

impl ScriptedTranscriber {
    pub fn new(replies: Vec<Result<String, CollaboratorError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
        }
    }

    /// Always transcribe to `text`
    pub fn saying(text: &str) -> Self {
        Self::new(vec![Ok(text.to_string())])
    }

    pub fn failing(reason: &str) -> Self {
        Self::new(vec![Err(CollaboratorError::failed(Stage::Transcription, reason))])
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _audio: &AudioInput) -> Result<String, CollaboratorError> {
        let mut replies = self.replies.lock().expect("transcriber script poisoned");
        if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies[0].clone()
        }
    }
}

/// Transcriber that echoes the uploaded bytes as UTF-8 text
pub struct EchoTranscriber;

#[async_trait]
impl Transcriber for EchoTranscriber {
    async fn transcribe(&self, audio: &AudioInput) -> Result<String, CollaboratorError> {
        let bytes = audio
            .read()
            .await
            .map_err(|e| CollaboratorError::failed(Stage::Transcription, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Chat model that records every history it is called with
pub struct RecordingChat {
    reply: Result<String, CollaboratorError>,
    delay: Duration,
    pub calls: Mutex<Vec<Vec<Message>>>,
}

impl RecordingChat {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            reply: Err(CollaboratorError::failed(Stage::Chat, reason)),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Wait `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("chat calls poisoned").len()
    }
}

#[async_trait]
impl ChatModel for RecordingChat {
    async fn complete(&self, messages: &[Message]) -> Result<String, CollaboratorError> {
        self.calls
            .lock()
            .expect("chat calls poisoned")
            .push(messages.to_vec());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.reply.clone()
    }
}

/// Synthesizer that writes the text itself as the "MP3" payload
pub struct TextSynthesizer {
    fail_with: Option<String>,
}

impl TextSynthesizer {
    pub const fn ok() -> Self {
        Self { fail_with: None }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            fail_with: Some(reason.to_string()),
        }
    }
}

#[async_trait]
impl Synthesizer for TextSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<AudioClip, CollaboratorError> {
        if let Some(reason) = &self.fail_with {
            return Err(CollaboratorError::failed(Stage::Synthesis, reason));
        }
        AudioClip::mp3(text.as_bytes()).map_err(|e| CollaboratorError::failed(Stage::Synthesis, e))
    }
}

/// Build a processor from fakes
pub fn processor(
    transcriber: impl Transcriber + 'static,
    chat: Arc<RecordingChat>,
    synthesizer: TextSynthesizer,
) -> TurnProcessor {
    TurnProcessor::new(Arc::new(transcriber), chat, Arc::new(synthesizer))
}

/// Processor where every stage succeeds with the given texts
pub fn happy_processor(heard: &str, reply: &str) -> (TurnProcessor, Arc<RecordingChat>) {
    let chat = Arc::new(RecordingChat::replying(reply));
    let processor = processor(
        ScriptedTranscriber::saying(heard),
        Arc::clone(&chat),
        TextSynthesizer::ok(),
    );
    (processor, chat)
}

/// A short fake recording
pub fn speech() -> AudioInput {
    AudioInput::from_bytes(b"RIFF....WAVE".to_vec(), "speech.wav")
}
