//! Voice turn processing
//!
//! One turn runs transcription, chat completion and speech synthesis in
//! that order against a session's [`TurnMemory`]. Collaborator failures never
//! escape: they become a `System Error:` line in the transcript and the turn
//! returns without audio.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::conversation::{Message, TurnMemory};
use crate::voice::{AudioClip, AudioInput};

/// Prefix of the assistant line recorded when a collaborator fails
pub const SYSTEM_ERROR_PREFIX: &str = "System Error: ";

/// Default bound on each collaborator call
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(60);

/// Pipeline stage a collaborator belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Transcription,
    Chat,
    Synthesis,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Transcription => "transcription",
            Self::Chat => "chat completion",
            Self::Synthesis => "speech synthesis",
        })
    }
}

/// Failure reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// The collaborator returned an error
    #[error("{stage} failed: {reason}")]
    Failed { stage: Stage, reason: String },

    /// The collaborator did not answer in time
    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: Stage, after: Duration },
}

impl CollaboratorError {
    /// Failure at the given stage
    pub fn failed(stage: Stage, reason: impl std::fmt::Display) -> Self {
        Self::Failed {
            stage,
            reason: reason.to_string(),
        }
    }

    /// Stage that failed
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Failed { stage, .. } | Self::Timeout { stage, .. } => *stage,
        }
    }
}

/// Speech-to-text collaborator
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe recorded audio; silent input may yield empty text
    async fn transcribe(&self, audio: &AudioInput) -> Result<String, CollaboratorError>;

    /// Whether the collaborator can serve requests
    fn is_available(&self) -> bool {
        true
    }
}

/// Chat-completion collaborator
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Produce one assistant reply for the full ordered history
    async fn complete(&self, messages: &[Message]) -> Result<String, CollaboratorError>;

    /// Whether the collaborator can serve requests
    fn is_available(&self) -> bool {
        true
    }
}

/// Text-to-speech collaborator
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Render text as a playable audio clip
    async fn synthesize(&self, text: &str) -> Result<AudioClip, CollaboratorError>;

    /// Whether the collaborator can serve requests
    fn is_available(&self) -> bool {
        true
    }
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// No audio was submitted
    NoInput,
    /// The audio transcribed to nothing
    Silent,
    /// Reply recorded and synthesized
    Completed,
    /// A collaborator failed; the error is in the transcript
    Failed(CollaboratorError),
    /// Memory was reinitialized
    Reset,
}

impl TurnOutcome {
    /// Short machine-readable label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoInput => "no_input",
            Self::Silent => "silent",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
            Self::Reset => "reset",
        }
    }
}

/// Everything the UI surface needs after a turn or reset
#[derive(Debug)]
pub struct TurnOutput {
    /// User-visible transcript derived from `memory`
    pub transcript: Vec<Message>,
    /// Conversation memory to keep for the next turn
    pub memory: TurnMemory,
    /// Synthesized reply, present only for completed turns
    pub audio: Option<AudioClip>,
    /// Always set: the input widget should be cleared
    pub clear_input: bool,
    /// How the turn ended
    pub outcome: TurnOutcome,
}

impl TurnOutput {
    fn new(memory: TurnMemory, audio: Option<AudioClip>, outcome: TurnOutcome) -> Self {
        debug_assert!(memory.is_well_formed(), "turn memory lost its system directive");
        Self {
            transcript: memory.transcript(),
            memory,
            audio,
            clear_input: true,
            outcome,
        }
    }
}

/// Reinitialize a conversation to just its hidden directive
pub fn reset(directive: impl Into<String>) -> TurnOutput {
    TurnOutput::new(TurnMemory::new(directive), None, TurnOutcome::Reset)
}

/// Runs voice turns against the configured collaborators
pub struct TurnProcessor {
    transcriber: Arc<dyn Transcriber>,
    chat: Arc<dyn ChatModel>,
    synthesizer: Arc<dyn Synthesizer>,
    timeout: Duration,
}

impl TurnProcessor {
    /// Create a processor with the default collaborator timeout
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        chat: Arc<dyn ChatModel>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            transcriber,
            chat,
            synthesizer,
            timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    /// Bound each collaborator call by `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Transcription collaborator
    #[must_use]
    pub fn transcriber(&self) -> &Arc<dyn Transcriber> {
        &self.transcriber
    }

    /// Chat collaborator
    #[must_use]
    pub fn chat(&self) -> &Arc<dyn ChatModel> {
        &self.chat
    }

    /// Synthesis collaborator
    #[must_use]
    pub fn synthesizer(&self) -> &Arc<dyn Synthesizer> {
        &self.synthesizer
    }

    /// Process one voice turn
    ///
    /// Absent or silent audio leaves `memory` untouched. Otherwise a user
    /// message and an assistant message (the reply, or a `System Error:`
    /// line) are appended.
    pub async fn process_turn(&self, audio: Option<&AudioInput>, memory: TurnMemory) -> TurnOutput {
        debug_assert!(memory.is_well_formed(), "turn memory lost its system directive");

        let Some(audio) = audio else {
            tracing::debug!("no audio submitted, skipping turn");
            return TurnOutput::new(memory, None, TurnOutcome::NoInput);
        };

        let mut memory = memory;
        match self.run(audio, &mut memory).await {
            Ok(Some(clip)) => {
                tracing::info!(messages = memory.message_count(), "turn complete");
                TurnOutput::new(memory, Some(clip), TurnOutcome::Completed)
            }
            Ok(None) => {
                tracing::debug!("empty transcription, skipping turn");
                TurnOutput::new(memory, None, TurnOutcome::Silent)
            }
            Err(e) => {
                tracing::warn!(stage = %e.stage(), error = %e, "turn failed");
                memory.push_assistant(format!("{SYSTEM_ERROR_PREFIX}{e}"));
                TurnOutput::new(memory, None, TurnOutcome::Failed(e))
            }
        }
    }

    /// Run the three collaborator stages, appending to `memory` as they succeed
    async fn run(
        &self,
        audio: &AudioInput,
        memory: &mut TurnMemory,
    ) -> Result<Option<AudioClip>, CollaboratorError> {
        let transcript = self
            .bounded(Stage::Transcription, self.transcriber.transcribe(audio))
            .await?;
        let user_text = transcript.trim();
        if user_text.is_empty() {
            return Ok(None);
        }
        tracing::debug!(chars = user_text.len(), "transcribed user speech");
        memory.push_user(user_text);

        let reply = self
            .bounded(Stage::Chat, self.chat.complete(memory.messages()))
            .await?;
        tracing::debug!(chars = reply.len(), "received assistant reply");
        memory.push_assistant(reply.as_str());

        let clip = self
            .bounded(Stage::Synthesis, self.synthesizer.synthesize(&reply))
            .await?;
        Ok(Some(clip))
    }

    async fn bounded<T>(
        &self,
        stage: Stage,
        call: impl Future<Output = Result<T, CollaboratorError>>,
    ) -> Result<T, CollaboratorError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(CollaboratorError::Timeout {
                stage,
                after: self.timeout,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl Transcriber for Fixed {
        async fn transcribe(&self, _audio: &AudioInput) -> Result<String, CollaboratorError> {
            Ok(self.0.to_string())
        }
    }

    #[async_trait]
    impl ChatModel for Fixed {
        async fn complete(&self, messages: &[Message]) -> Result<String, CollaboratorError> {
            assert_eq!(messages[0].role, crate::conversation::Role::System);
            Ok(self.0.to_string())
        }
    }

    struct Stalled;

    #[async_trait]
    impl ChatModel for Stalled {
        async fn complete(&self, _messages: &[Message]) -> Result<String, CollaboratorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }
    }

    struct Mp3;

    #[async_trait]
    impl Synthesizer for Mp3 {
        async fn synthesize(&self, text: &str) -> Result<AudioClip, CollaboratorError> {
            AudioClip::mp3(text.as_bytes()).map_err(|e| CollaboratorError::failed(Stage::Synthesis, e))
        }
    }

    fn input() -> AudioInput {
        AudioInput::from_bytes(vec![0_u8; 16], "audio.wav")
    }

    #[tokio::test]
    async fn transcribed_text_is_trimmed() {
        let processor =
            TurnProcessor::new(Arc::new(Fixed("  hello \n")), Arc::new(Fixed("hi")), Arc::new(Mp3));
        let out = processor
            .process_turn(Some(&input()), TurnMemory::new("sys"))
            .await;

        assert_eq!(out.transcript[0], Message::user("hello"));
        assert_eq!(out.outcome, TurnOutcome::Completed);
        assert!(out.clear_input);
    }

    #[tokio::test]
    async fn slow_chat_becomes_timeout_error_line() {
        let processor =
            TurnProcessor::new(Arc::new(Fixed("hello")), Arc::new(Stalled), Arc::new(Mp3))
                .with_timeout(Duration::from_millis(20));
        let out = processor
            .process_turn(Some(&input()), TurnMemory::new("sys"))
            .await;

        assert!(out.audio.is_none());
        assert_eq!(out.memory.message_count(), 3);
        let last = &out.transcript[1];
        assert!(last.content.starts_with(SYSTEM_ERROR_PREFIX));
        assert!(last.content.contains("timed out"));
        assert!(matches!(
            out.outcome,
            TurnOutcome::Failed(CollaboratorError::Timeout { stage: Stage::Chat, .. })
        ));
    }

    #[test]
    fn reset_yields_only_directive() {
        let out = reset("sys");
        assert_eq!(out.memory.message_count(), 1);
        assert_eq!(out.memory.directive(), "sys");
        assert!(out.transcript.is_empty());
        assert!(out.audio.is_none());
        assert_eq!(out.outcome, TurnOutcome::Reset);
    }

    #[test]
    fn error_message_format() {
        let err = CollaboratorError::failed(Stage::Chat, "429 rate limited");
        assert_eq!(err.to_string(), "chat completion failed: 429 rate limited");
        let err = CollaboratorError::Timeout {
            stage: Stage::Synthesis,
            after: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "speech synthesis timed out after 60s");
    }
}
