//! Configuration management for the VocaFree gateway
//!
//! Values resolve env > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::conversation::DEFAULT_SYSTEM_PROMPT;
use crate::turn::DEFAULT_COLLABORATOR_TIMEOUT;
use crate::voice::stt::{GROQ_BASE_URL, OPENAI_BASE_URL};
use crate::{Error, Result};

use file::ConfigFile;

/// Default cap on uploaded audio, matching the Whisper API upload limit
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat model configuration
    pub llm: LlmConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Evict sessions idle this long
    pub session_idle_ttl: Duration,

    /// Bound on each collaborator call within a turn
    pub turn_timeout: Duration,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Chat model configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible API base
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Reply length cap
    pub max_tokens: Option<u32>,

    /// Hidden system directive opening every conversation
    pub system_prompt: String,
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttBackend {
    Groq,
    OpenAi,
    Deepgram,
}

impl SttBackend {
    /// Default model for the backend
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Groq => "whisper-large-v3",
            Self::OpenAi => "whisper-1",
            Self::Deepgram => "nova-2",
        }
    }
}

impl FromStr for SttBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" | "whisper" => Ok(Self::OpenAi),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsBackend {
    /// Keyless Google Translate speech
    Google,
    OpenAi,
    ElevenLabs,
}

impl TtsBackend {
    /// Default model for the backend
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Google => "",
            Self::OpenAi => "tts-1",
            Self::ElevenLabs => "eleven_monolingual_v1",
        }
    }

    /// Default voice for the backend
    #[must_use]
    pub const fn default_voice(self) -> &'static str {
        match self {
            Self::Google => "",
            Self::OpenAi => "alloy",
            Self::ElevenLabs => "21m00Tcm4TlvDq8ikWAM",
        }
    }
}

impl FromStr for TtsBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT backend
    pub stt_provider: SttBackend,

    /// STT model
    pub stt_model: String,

    /// OpenAI-compatible STT base URL (Groq/OpenAI backends)
    pub stt_base_url: String,

    /// TTS backend
    pub tts_provider: TtsBackend,

    /// TTS model
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Language code for Google speech
    pub tts_language: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path to static files directory (web UI)
    pub static_dir: Option<PathBuf>,

    /// Global request limit per minute, unlimited when unset
    pub rate_limit_rpm: Option<u32>,

    /// Largest accepted audio upload in bytes
    pub max_upload_bytes: usize,
}

/// API keys for external services
#[derive(Clone, Default)]
pub struct ApiKeys {
    /// Groq API key (chat and Whisper)
    pub groq: Option<String>,

    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("ApiKeys")
            .field("groq", &redact(&self.groq))
            .field("openai", &redact(&self.openai))
            .field("deepgram", &redact(&self.deepgram))
            .field("elevenlabs", &redact(&self.elevenlabs))
            .finish()
    }
}

impl Config {
    /// Load configuration from the environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid (unknown provider, speed out of range)
    pub fn load() -> Result<Self> {
        Self::resolve(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Load configuration from the environment and an explicit config file
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or invalid, or a value is invalid
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        Self::resolve(file::read_config_file(path)?, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an env lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is invalid
    pub fn resolve(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let parse = |key: &str| env(key).and_then(|s| s.parse::<u64>().ok());

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            groq: env("GROQ_API_KEY").or(fc.api_keys.groq),
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        let llm = LlmConfig {
            base_url: env("VOCAFREE_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| GROQ_BASE_URL.to_string()),
            model: env("VOCAFREE_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| crate::llm::DEFAULT_MODEL.to_string()),
            max_tokens: env("VOCAFREE_LLM_MAX_TOKENS")
                .and_then(|s| s.parse().ok())
                .or(fc.llm.max_tokens),
            system_prompt: env("VOCAFREE_SYSTEM_PROMPT")
                .or(fc.llm.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        // Voice config (env > toml > backend default)
        let stt_provider = env("VOCAFREE_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .map_or(Ok(SttBackend::Groq), |s| s.parse())?;
        let tts_provider = env("VOCAFREE_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .map_or(Ok(TtsBackend::Google), |s| s.parse())?;
        let tts_speed = fc.voice.tts_speed.unwrap_or(1.0);
        if !(0.25..=4.0).contains(&tts_speed) {
            return Err(Error::Config(format!(
                "tts_speed must be between 0.25 and 4.0, got {tts_speed}"
            )));
        }

        let default_stt_base = match stt_provider {
            SttBackend::OpenAi => OPENAI_BASE_URL,
            SttBackend::Groq | SttBackend::Deepgram => GROQ_BASE_URL,
        };
        let voice = VoiceConfig {
            stt_provider,
            stt_model: env("VOCAFREE_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| stt_provider.default_model().to_string()),
            stt_base_url: fc
                .voice
                .stt_base_url
                .unwrap_or_else(|| default_stt_base.to_string()),
            tts_provider,
            tts_model: env("VOCAFREE_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| tts_provider.default_model().to_string()),
            tts_voice: env("VOCAFREE_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| tts_provider.default_voice().to_string()),
            tts_language: fc.voice.tts_language.unwrap_or_else(|| "en".to_string()),
            tts_speed,
        };

        // Server config (env > toml > default)
        let server = ServerConfig {
            host: env("VOCAFREE_HOST")
                .or(fc.server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env("VOCAFREE_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(7860),
            static_dir: env("VOCAFREE_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
            rate_limit_rpm: env("VOCAFREE_RATE_LIMIT_RPM")
                .and_then(|s| s.parse().ok())
                .or(fc.server.rate_limit_rpm)
                .filter(|rpm| *rpm > 0),
            max_upload_bytes: env("VOCAFREE_MAX_UPLOAD_BYTES")
                .and_then(|s| s.parse().ok())
                .or(fc.server.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        let session_idle_ttl = Duration::from_secs(
            parse("VOCAFREE_SESSION_TTL")
                .or(fc.session.idle_ttl_secs)
                .unwrap_or(3600),
        );

        let turn_timeout = parse("VOCAFREE_TURN_TIMEOUT")
            .or(fc.turn.collaborator_timeout_secs)
            .map_or(DEFAULT_COLLABORATOR_TIMEOUT, Duration::from_secs);

        Ok(Self {
            llm,
            voice,
            server,
            session_idle_ttl,
            turn_timeout,
            api_keys,
        })
    }

    /// Key for the chat API, chosen by base URL
    #[must_use]
    pub fn chat_api_key(&self) -> Option<&str> {
        if self.llm.base_url.contains("openai.com") {
            self.api_keys.openai.as_deref()
        } else {
            self.api_keys.groq.as_deref()
        }
    }

    /// Key for the configured STT backend
    #[must_use]
    pub fn stt_api_key(&self) -> Option<&str> {
        match self.voice.stt_provider {
            SttBackend::Groq => self.api_keys.groq.as_deref(),
            SttBackend::OpenAi => self.api_keys.openai.as_deref(),
            SttBackend::Deepgram => self.api_keys.deepgram.as_deref(),
        }
    }
}
