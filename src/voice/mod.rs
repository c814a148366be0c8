//! Voice processing module
//!
//! Speech-to-text and text-to-speech clients used as turn collaborators,
//! the audio handles they exchange, and local microphone/speaker support
//! for the `talk` command.

mod audio;
mod capture;
mod playback;
pub mod stt;
pub mod tts;

pub use audio::{AudioClip, AudioInput, extension_for_mime, mime_for_extension};
pub use capture::{AudioCapture, SAMPLE_RATE, rms, samples_to_wav};
pub use playback::AudioPlayback;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
