//! Chat completion against an OpenAI-compatible API (Groq by default)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::Message;
use crate::turn::{ChatModel, CollaboratorError, Stage};
use crate::{Error, Result};

/// Default chat model
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Stateless chat-completion client
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: Option<u32>,
}

impl ChatClient {
    /// Create a client for `{base_url}/chat/completions`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(base_url: &str, api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("API key required for chat completion".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            max_tokens: None,
        })
    }

    /// Cap the reply length
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Request a single completion for the ordered history
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the reply has no content
    pub async fn complete_messages(&self, messages: &[Message]) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "requesting chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Chat(format!("chat API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response.json().await?;
        reply_text(result)
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(&self, messages: &[Message]) -> std::result::Result<String, CollaboratorError> {
        self.complete_messages(messages)
            .await
            .map_err(|e| CollaboratorError::failed(Stage::Chat, e))
    }
}

fn reply_text(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::Chat("response contained no choices".to_string()))?
        .message
        .content
        .ok_or_else(|| Error::Chat("completion returned no content".to_string()))
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_full_history() {
        let messages = [Message::system("sys"), Message::user("hello")];
        let request = ChatCompletionRequest {
            model: DEFAULT_MODEL,
            messages: &messages,
            max_tokens: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hello");
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn reply_extraction() {
        let ok: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#)
                .unwrap();
        assert_eq!(reply_text(ok).unwrap(), "hi there");

        let none: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(reply_text(none), Err(Error::Chat(_))));

        let null: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(reply_text(null).is_err());
    }

    #[test]
    fn requires_key() {
        assert!(ChatClient::new(crate::voice::stt::GROQ_BASE_URL, String::new(), DEFAULT_MODEL.into()).is_err());
    }
}
