//! Session-scoped conversation state
//!
//! Each session owns its [`TurnMemory`] and at most one unfetched reply clip.
//! Sessions sit behind an async mutex that a turn holds from start to
//! finish, so overlapping submissions for one session queue up and apply in
//! arrival order (tokio's mutex is FIFO-fair).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::conversation::{Message, TurnMemory};
use crate::turn::{self, TurnOutcome, TurnProcessor};
use crate::voice::{AudioClip, AudioInput};
use crate::{Error, Result};

/// Session handle shared between requests
pub type SharedSession = Arc<Mutex<Session>>;

/// Result of a turn or reset as seen by the UI surface
#[derive(Debug, Clone)]
pub struct TurnView {
    /// User-visible transcript after the turn
    pub transcript: Vec<Message>,
    /// Whether a reply clip is waiting to be fetched
    pub has_audio: bool,
    /// Always set: the input widget should be cleared
    pub clear_input: bool,
    /// How the turn ended
    pub outcome: TurnOutcome,
}

/// One user's conversation
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    memory: TurnMemory,
    pending_audio: Option<AudioClip>,
    created_at: DateTime<Utc>,
    last_active: Instant,
}

impl Session {
    /// Start a session with only the hidden directive
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            memory: TurnMemory::new(directive),
            pending_audio: None,
            created_at: Utc::now(),
            last_active: Instant::now(),
        }
    }

    /// Session identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Full conversation memory
    #[must_use]
    pub const fn memory(&self) -> &TurnMemory {
        &self.memory
    }

    /// User-visible transcript
    #[must_use]
    pub fn transcript(&self) -> Vec<Message> {
        self.memory.transcript()
    }

    /// Creation time
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time since the last turn, reset or audio fetch
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }

    /// Whether a reply clip is waiting
    #[must_use]
    pub const fn has_audio(&self) -> bool {
        self.pending_audio.is_some()
    }

    /// Run one turn and commit its memory
    ///
    /// Any unfetched clip from an earlier turn is discarded first.
    pub async fn run_turn(&mut self, processor: &TurnProcessor, audio: Option<&AudioInput>) -> TurnView {
        self.touch();
        self.pending_audio = None;

        // Work on a copy so a dropped request leaves memory as it was
        let output = processor.process_turn(audio, self.memory.clone()).await;

        self.memory = output.memory;
        self.pending_audio = output.audio;
        self.touch();

        tracing::debug!(
            session_id = %self.id,
            outcome = output.outcome.as_str(),
            messages = self.memory.message_count(),
            "session turn applied"
        );

        TurnView {
            transcript: output.transcript,
            has_audio: self.pending_audio.is_some(),
            clear_input: output.clear_input,
            outcome: output.outcome,
        }
    }

    /// Reset to the original directive, dropping any pending clip
    pub fn reset(&mut self) -> TurnView {
        let output = turn::reset(self.memory.directive());
        self.memory = output.memory;
        self.pending_audio = None;
        self.touch();

        tracing::debug!(session_id = %self.id, "session reset");

        TurnView {
            transcript: output.transcript,
            has_audio: false,
            clear_input: output.clear_input,
            outcome: output.outcome,
        }
    }

    /// Take the pending reply clip; it can be fetched only once
    pub fn take_audio(&mut self) -> Option<AudioClip> {
        self.touch();
        self.pending_audio.take()
    }

    fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}

/// In-memory registry of live sessions
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
    directive: Arc<str>,
    idle_ttl: Duration,
}

impl SessionStore {
    /// Create a store whose sessions open with `directive`
    pub fn new(directive: impl Into<String>, idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            directive: Arc::from(directive.into()),
            idle_ttl,
        }
    }

    /// Open a new session
    pub async fn create(&self) -> (Uuid, SharedSession) {
        let session = Session::new(&*self.directive);
        let id = session.id();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&shared));

        tracing::info!(session_id = %id, "session created");
        (id, shared)
    }

    /// Look up a session
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] for unknown or evicted ids
    pub async fn get(&self, id: Uuid) -> Result<SharedSession> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::SessionNotFound(id.to_string()))
    }

    /// Look up a session and wait for exclusive access to it
    ///
    /// Fails if the session was removed or evicted while waiting, so callers
    /// never run a turn on a session nobody can reach anymore.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionNotFound`] for unknown, removed or evicted ids
    pub async fn lock(&self, id: Uuid) -> Result<OwnedMutexGuard<Session>> {
        let guard = self.get(id).await?.lock_owned().await;

        // Eviction skips locked sessions, so membership cannot change past here
        if self.sessions.read().await.contains_key(&id) {
            Ok(guard)
        } else {
            Err(Error::SessionNotFound(id.to_string()))
        }
    }

    /// Drop a session; returns whether it existed
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session removed");
        }
        removed
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no sessions are live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Evict sessions idle longer than the configured TTL
    ///
    /// Sessions in the middle of a turn are locked and therefore skipped.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            !session
                .try_lock()
                .is_ok_and(|s| s.idle_for() >= self.idle_ttl)
        });
        let evicted = before - sessions.len();
        drop(sessions);

        if evicted > 0 {
            tracing::info!(evicted, "evicted idle sessions");
        }
        evicted
    }

    /// Periodically evict idle sessions until the store is dropped elsewhere
    #[must_use]
    pub fn spawn_sweeper(&self, every: Duration) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                store.evict_idle().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use async_trait::async_trait;

    use super::*;
    use crate::turn::{ChatModel, CollaboratorError, Stage, Synthesizer, Transcriber};

    struct Scripted;

    #[async_trait]
    impl Transcriber for Scripted {
        async fn transcribe(&self, _audio: &AudioInput) -> std::result::Result<String, CollaboratorError> {
            Ok("hello".to_string())
        }
    }

    #[async_trait]
    impl ChatModel for Scripted {
        async fn complete(&self, _messages: &[Message]) -> std::result::Result<String, CollaboratorError> {
            Ok("hi there".to_string())
        }
    }

    #[async_trait]
    impl Synthesizer for Scripted {
        async fn synthesize(&self, text: &str) -> std::result::Result<AudioClip, CollaboratorError> {
            AudioClip::mp3(text.as_bytes()).map_err(|e| CollaboratorError::failed(Stage::Synthesis, e))
        }
    }

    fn processor() -> TurnProcessor {
        TurnProcessor::new(Arc::new(Scripted), Arc::new(Scripted), Arc::new(Scripted))
    }

    fn speech() -> AudioInput {
        AudioInput::from_bytes(vec![1, 2, 3], "speech.wav")
    }

    /// Run a turn and return the path of the clip it left pending
    async fn turn_with_clip(session: &mut Session, processor: &TurnProcessor) -> PathBuf {
        session.run_turn(processor, Some(&speech())).await;
        let path = session
            .pending_audio
            .as_ref()
            .map(|clip| clip.path().to_path_buf())
            .unwrap();
        assert!(path.exists());
        path
    }

    #[tokio::test]
    async fn next_turn_deletes_unfetched_clip() {
        let processor = processor();
        let mut session = Session::new("sys");

        let first = turn_with_clip(&mut session, &processor).await;
        let second = turn_with_clip(&mut session, &processor).await;

        assert_ne!(first, second);
        assert!(!first.exists());
    }

    #[tokio::test]
    async fn reset_deletes_unfetched_clip() {
        let processor = processor();
        let mut session = Session::new("sys");
        let path = turn_with_clip(&mut session, &processor).await;

        session.reset();

        assert!(!path.exists());
    }

    #[tokio::test]
    async fn eviction_deletes_unfetched_clip() {
        let processor = processor();
        let store = SessionStore::new("sys", Duration::ZERO);
        let (id, shared) = store.create().await;
        drop(shared);

        let path = {
            let mut session = store.lock(id).await.unwrap();
            turn_with_clip(&mut session, &processor).await
        };

        assert_eq!(store.evict_idle().await, 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn lock_fails_for_session_removed_while_waiting() {
        let store = SessionStore::new("sys", Duration::from_secs(60));
        let (id, shared) = store.create().await;
        let held = shared.lock().await;

        let waiter = tokio::spawn({
            let store = store.clone();
            async move { store.lock(id).await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.remove(id).await);
        drop(held);

        assert!(matches!(waiter.await.unwrap(), Err(Error::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn lock_grants_access_to_live_session() {
        let store = SessionStore::new("sys", Duration::from_secs(60));
        let (id, _) = store.create().await;

        let session = store.lock(id).await.unwrap();
        assert_eq!(session.id(), id);
    }

    #[tokio::test]
    async fn create_get_remove() {
        let store = SessionStore::new("sys", Duration::from_secs(60));
        let (id, _) = store.create().await;

        assert_eq!(store.len().await, 1);
        let session = store.get(id).await.unwrap();
        assert!(session.lock().await.transcript().is_empty());

        assert!(store.remove(id).await);
        assert!(!store.remove(id).await);
        assert!(matches!(store.get(id).await, Err(Error::SessionNotFound(_))));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn evicts_only_idle_unlocked_sessions() {
        let store = SessionStore::new("sys", Duration::ZERO);
        let (_, busy) = store.create().await;
        store.create().await;

        let guard = busy.lock().await;
        assert_eq!(store.evict_idle().await, 1);
        assert_eq!(store.len().await, 1);
        drop(guard);

        assert_eq!(store.evict_idle().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn fresh_sessions_survive_sweep() {
        let store = SessionStore::new("sys", Duration::from_secs(3600));
        store.create().await;
        assert_eq!(store.evict_idle().await, 0);
    }

    #[test]
    fn reset_keeps_directive() {
        let mut session = Session::new("be brief");
        let view = session.reset();
        assert!(view.transcript.is_empty());
        assert_eq!(session.memory().directive(), "be brief");
        assert_eq!(view.outcome, TurnOutcome::Reset);
        assert!(session.take_audio().is_none());
    }
}
