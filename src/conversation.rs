//! Conversation memory and the user-visible transcript
//!
//! A [`TurnMemory`] is the full ordered history sent to the chat model. It
//! always starts with exactly one hidden system directive; the transcript
//! shown to the user is its [`project`]ion without that directive.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hidden directive used when no system prompt is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional, intelligent AI assistant \
demonstrating a low-latency voice architecture. Provide concise, highly accurate, and polite \
responses.";

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversational unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered conversation history led by the hidden system directive
///
/// The only way to add messages is [`push_user`](Self::push_user) and
/// [`push_assistant`](Self::push_assistant), so the leading system message
/// can be neither removed nor duplicated once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<Message>", try_from = "Vec<Message>")]
pub struct TurnMemory {
    messages: Vec<Message>,
}

impl TurnMemory {
    /// Start a conversation holding only the system directive
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(directive)],
        }
    }

    /// Rebuild memory from raw messages
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMemory`] unless the first message is the only
    /// system message
    pub fn from_messages(messages: Vec<Message>) -> Result<Self> {
        match messages.first() {
            None => return Err(Error::InvalidMemory("memory is empty".to_string())),
            Some(first) if first.role != Role::System => {
                return Err(Error::InvalidMemory(format!(
                    "first message has role {}, expected system",
                    first.role
                )));
            }
            Some(_) => {}
        }

        if let Some(pos) = messages
            .iter()
            .skip(1)
            .position(|m| m.role == Role::System)
        {
            return Err(Error::InvalidMemory(format!(
                "extra system message at index {}",
                pos + 1
            )));
        }

        Ok(Self { messages })
    }

    /// Full history, system directive first
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The hidden system directive
    #[must_use]
    pub fn directive(&self) -> &str {
        &self.messages[0].content
    }

    /// Number of messages including the directive
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Append a user message
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    /// Append an assistant message
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// User-visible transcript
    #[must_use]
    pub fn transcript(&self) -> Vec<Message> {
        project(&self.messages)
    }

    /// Check the single-leading-system invariant
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.messages.first().is_some_and(|m| m.role == Role::System)
            && self.messages[1..].iter().all(|m| m.role != Role::System)
    }
}

impl Default for TurnMemory {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl TryFrom<Vec<Message>> for TurnMemory {
    type Error = Error;

    fn try_from(messages: Vec<Message>) -> Result<Self> {
        Self::from_messages(messages)
    }
}

impl From<TurnMemory> for Vec<Message> {
    fn from(memory: TurnMemory) -> Self {
        memory.messages
    }
}

/// Derive the user-visible transcript: every non-system message, in order
#[must_use]
pub fn project(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::System)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_memory() -> TurnMemory {
        let mut memory = TurnMemory::new("be brief");
        memory.push_user("hello");
        memory.push_assistant("hi there");
        memory.push_user("what time is it?");
        memory.push_assistant("System Error: timed out");
        memory
    }

    #[test]
    fn new_memory_holds_only_directive() {
        let memory = TurnMemory::new("be brief");
        assert_eq!(memory.message_count(), 1);
        assert_eq!(memory.directive(), "be brief");
        assert!(memory.transcript().is_empty());
        assert!(memory.is_well_formed());
    }

    #[test]
    fn projection_drops_system_and_keeps_order() {
        let memory = sample_memory();
        let transcript = memory.transcript();

        assert_eq!(transcript.len(), memory.message_count() - 1);
        assert!(transcript.iter().all(|m| m.role != Role::System));
        let contents: Vec<&str> = transcript.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            ["hello", "hi there", "what time is it?", "System Error: timed out"]
        );
    }

    #[test]
    fn projection_is_idempotent_and_non_mutating() {
        let memory = sample_memory();
        let before = memory.clone();

        let once = project(memory.messages());
        let twice = project(memory.messages());

        assert_eq!(once, twice);
        assert_eq!(memory, before);
        assert_eq!(project(&once), once);
    }

    #[test]
    fn from_messages_rejects_missing_directive() {
        let err = TurnMemory::from_messages(vec![Message::user("hi")]).unwrap_err();
        assert!(matches!(err, Error::InvalidMemory(_)));

        let err = TurnMemory::from_messages(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidMemory(_)));
    }

    #[test]
    fn from_messages_rejects_second_directive() {
        let err = TurnMemory::from_messages(vec![
            Message::system("a"),
            Message::user("hi"),
            Message::system("b"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("index 2"));
    }

    #[test]
    fn serializes_as_openai_style_messages() {
        let mut memory = TurnMemory::new("sys");
        memory.push_user("hello");

        let json = serde_json::to_value(&memory).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "hello"},
            ])
        );

        let parsed: TurnMemory = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, memory);
    }

    #[test]
    fn deserialize_validates_invariant() {
        let json = serde_json::json!([{"role": "user", "content": "hello"}]);
        assert!(serde_json::from_value::<TurnMemory>(json).is_err());
    }
}
