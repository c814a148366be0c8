//! VocaFree Gateway - push-to-talk voice assistant
//!
//! One turn takes a recorded utterance, transcribes it, asks a chat model
//! for a reply, speaks the reply and returns the updated transcript:
//!
//! ```text
//!  audio ──▶ Transcriber ──▶ ChatModel ──▶ Synthesizer ──▶ reply clip
//!                 │               │              │
//!                 └───────── TurnMemory ─────────┘
//!                                 │
//!                            transcript (directive hidden)
//! ```
//!
//! Any collaborator failure is recorded in the conversation as a
//! `System Error: ...` line instead of failing the turn.

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod providers;
pub mod session;
pub mod turn;
pub mod voice;

pub use config::Config;
pub use conversation::{DEFAULT_SYSTEM_PROMPT, Message, Role, TurnMemory, project};
pub use error::{Error, Result};
pub use session::{Session, SessionStore};
pub use turn::{
    ChatModel, CollaboratorError, Stage, Synthesizer, Transcriber, TurnOutcome, TurnOutput,
    TurnProcessor,
};
pub use voice::{AudioClip, AudioInput};
