//! TOML configuration file loading
//!
//! Supports `~/.config/vocafree/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Chat model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Speech-to-text and text-to-speech configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Session lifetime configuration
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Turn pipeline configuration
    #[serde(default)]
    pub turn: TurnFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// OpenAI-compatible API base (e.g. `https://api.groq.com/openai/v1`)
    pub base_url: Option<String>,

    /// Model identifier (e.g. "llama-3.3-70b-versatile")
    pub model: Option<String>,

    /// Reply length cap
    pub max_tokens: Option<u32>,

    /// Hidden system directive
    pub system_prompt: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// "groq", "openai" or "deepgram"
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-large-v3")
    pub stt_model: Option<String>,

    /// Override for the OpenAI-compatible STT base URL
    pub stt_base_url: Option<String>,

    /// "google", "openai" or "elevenlabs"
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// Language code for Google speech (e.g. "en")
    pub tts_language: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Bind address
    pub host: Option<String>,

    /// Listen port
    pub port: Option<u16>,

    /// Directory with a web UI to serve
    pub static_dir: Option<String>,

    /// Global request limit per minute
    pub rate_limit_rpm: Option<u32>,

    /// Largest accepted audio upload in bytes
    pub max_upload_bytes: Option<usize>,
}

/// Session lifetime configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Evict sessions idle for this many seconds
    pub idle_ttl_secs: Option<u64>,
}

/// Turn pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct TurnFileConfig {
    /// Bound on each transcription/chat/synthesis call
    pub collaborator_timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub groq: Option<String>,
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
pub fn load_config_file_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match read_config_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            ConfigFile::default()
        }
    }
}

/// Read and parse a TOML config file that must exist
///
/// # Errors
///
/// Returns error if the file is missing, unreadable or invalid
pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/vocafree/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vocafree").join("config.toml"))
}
