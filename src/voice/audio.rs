//! Audio handles passed between the UI surface and the turn pipeline

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::Result;

/// Recorded audio submitted for transcription
#[derive(Debug, Clone)]
pub enum AudioInput {
    /// Audio already on disk
    File(PathBuf),
    /// Audio received in memory (e.g. an HTTP upload)
    Bytes {
        data: Vec<u8>,
        file_name: String,
    },
}

impl AudioInput {
    /// Wrap in-memory audio
    pub fn from_bytes(data: impl Into<Vec<u8>>, file_name: impl Into<String>) -> Self {
        Self::Bytes {
            data: data.into(),
            file_name: file_name.into(),
        }
    }

    /// Refer to an audio file on disk
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// File name reported to the transcription API
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::File(path) => path
                .file_name()
                .map_or_else(|| "audio.wav".to_string(), |n| n.to_string_lossy().into_owned()),
            Self::Bytes { file_name, .. } => file_name.clone(),
        }
    }

    /// MIME type guessed from the file extension
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        let name = self.file_name();
        let ext = Path::new(&name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        mime_for_extension(&ext)
    }

    /// Load the audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> Result<Vec<u8>> {
        match self {
            Self::File(path) => Ok(tokio::fs::read(path).await?),
            Self::Bytes { data, .. } => Ok(data.clone()),
        }
    }
}

/// MIME type for a lowercase audio file extension
#[must_use]
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "wav" => "audio/wav",
        "mp3" | "mpeg" | "mpga" => "audio/mpeg",
        "webm" => "audio/webm",
        "ogg" | "oga" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// File extension for an audio MIME type (parameters ignored)
#[must_use]
pub fn extension_for_mime(mime: &str) -> &'static str {
    let base = mime.split(';').next().unwrap_or_default().trim();
    match base {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/flac" => "flac",
        _ => "wav",
    }
}

/// Synthesized speech stored in a temporary file
///
/// The file is removed when the clip is dropped, so a consumer that reads
/// the clip once and lets it go leaves nothing behind.
#[derive(Debug)]
pub struct AudioClip {
    path: tempfile::TempPath,
    mime_type: &'static str,
}

impl AudioClip {
    /// Write audio bytes to a new temporary file
    ///
    /// # Errors
    ///
    /// Returns error if the temporary file cannot be created or written
    pub fn from_bytes(bytes: &[u8], suffix: &str, mime_type: &'static str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("vocafree-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            path: file.into_temp_path(),
            mime_type,
        })
    }

    /// Store MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the temporary file cannot be written
    pub fn mp3(bytes: &[u8]) -> Result<Self> {
        Self::from_bytes(bytes, ".mp3", "audio/mpeg")
    }

    /// Location of the audio file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// MIME type of the audio
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Read the whole clip
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub async fn read(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clip_file_removed_on_drop() {
        let clip = AudioClip::mp3(b"ID3fake").unwrap();
        let path = clip.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "mp3");
        assert_eq!(clip.read().await.unwrap(), b"ID3fake");

        drop(clip);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn input_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.webm");
        std::fs::write(&path, b"webm-bytes").unwrap();

        let input = AudioInput::from_path(&path);
        assert_eq!(input.file_name(), "prompt.webm");
        assert_eq!(input.mime_type(), "audio/webm");
        assert_eq!(input.read().await.unwrap(), b"webm-bytes");
    }

    #[test]
    fn mime_mapping() {
        assert_eq!(extension_for_mime("audio/webm;codecs=opus"), "webm");
        assert_eq!(extension_for_mime("application/octet-stream"), "wav");
        assert_eq!(AudioInput::from_bytes(vec![1], "a.WAV").mime_type(), "audio/wav");
    }
}
