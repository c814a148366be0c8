//! Text-to-speech (TTS) processing

use async_trait::async_trait;

use super::AudioClip;
use crate::turn::{CollaboratorError, Stage, Synthesizer};
use crate::{Error, Result};

/// Longest text Google Translate TTS accepts per request
const GOOGLE_CHUNK_CHARS: usize = 100;

/// TTS provider backend
#[derive(Clone, Copy, Debug)]
enum TtsProvider {
    OpenAI,
    ElevenLabs,
    Google,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI` with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, voice: String, speed: f32, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs with custom model
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Create a keyless TTS instance using Google Translate speech
    ///
    /// `language` is a language code such as "en". Speeds below 1.0 request
    /// the slow voice.
    #[must_use]
    pub fn new_google(language: String, speed: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: String::new(),
            voice: language,
            speed,
            model: String::new(),
            provider: TtsProvider::Google,
        }
    }

    /// Synthesize text to speech
    ///
    /// # Returns
    ///
    /// Audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize_mp3(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(Error::Tts("nothing to synthesize".to_string()));
        }

        match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
            TtsProvider::Google => self.synthesize_google(text).await,
        }
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!("https://api.elevenlabs.io/v1/text-to-speech/{}", self.voice);

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using Google Translate speech, one request per chunk
    ///
    /// MP3 frames are self-delimiting, so the chunk responses are
    /// concatenated as-is.
    async fn synthesize_google(&self, text: &str) -> Result<Vec<u8>> {
        let speed = if self.speed < 1.0 { "0.3" } else { "1" };
        let chunks = split_for_google(text, GOOGLE_CHUNK_CHARS);
        let total = chunks.len().to_string();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let response = self
                .client
                .get("https://translate.google.com/translate_tts")
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.voice.as_str()),
                    ("ttsspeed", speed),
                    ("q", chunk.as_str()),
                    ("idx", idx.as_str()),
                    ("total", total.as_str()),
                ])
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                return Err(Error::Tts(format!("Google TTS error {status} on chunk {idx}")));
            }

            audio.extend_from_slice(&response.bytes().await?);
        }

        tracing::debug!(chunks = chunks.len(), audio_bytes = audio.len(), "Google TTS complete");
        Ok(audio)
    }
}

/// Split text into word-aligned chunks of at most `max_chars` characters
///
/// Words longer than `max_chars` are broken on character boundaries.
fn split_for_google(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(chars.chunks(max_chars).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current.chars().count() + 1 + word_len
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> std::result::Result<AudioClip, CollaboratorError> {
        let audio = self
            .synthesize_mp3(text)
            .await
            .map_err(|e| CollaboratorError::failed(Stage::Synthesis, e))?;
        AudioClip::mp3(&audio).map_err(|e| CollaboratorError::failed(Stage::Synthesis, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_providers_require_key() {
        assert!(TextToSpeech::new_openai(String::new(), "alloy".into(), 1.0, "tts-1".into()).is_err());
        assert!(TextToSpeech::new_elevenlabs(String::new(), "voice".into(), "m".into()).is_err());
    }

    #[test]
    fn google_chunks_respect_limit_and_words() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(10);
        let chunks = split_for_google(&text, 30);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
        assert_eq!(chunks.join(" "), text.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    #[test]
    fn google_chunks_break_long_words() {
        let chunks = split_for_google("ab abcdefghij cd", 4);
        assert_eq!(chunks, ["ab", "abcd", "efgh", "ij", "cd"]);
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let tts = TextToSpeech::new_google("en".into(), 1.0);
        let err = tts.synthesize_mp3("   ").await.unwrap_err();
        assert!(matches!(err, Error::Tts(_)));
    }
}
