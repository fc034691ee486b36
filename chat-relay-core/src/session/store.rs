//! In-memory session store

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::transcript::{ChatMessage, Transcript};

/// Shared handle to one session
pub type SessionHandle = Arc<Session>;

#[derive(Debug)]
struct SessionState {
    transcript: Transcript,
    updated_at: DateTime<Utc>,
}

/// A conversation session
///
/// Reads are cheap snapshots. Appending requires a [`TurnGuard`], so turns on
/// the same session are serialized even when several connections share the id.
#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    state: RwLock<SessionState>,
    turn: tokio::sync::Mutex<()>,
}

impl Session {
    /// Create a new, empty session
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            state: RwLock::new(SessionState {
                transcript: Transcript::new(),
                updated_at: now,
            }),
            turn: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy of every message, oldest first
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().transcript.messages().to_vec()
    }

    /// Number of messages in the transcript
    pub fn len(&self) -> usize {
        self.state.read().transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Summary used by the session listing
    pub fn info(&self) -> SessionInfo {
        let state = self.state.read();
        SessionInfo {
            id: self.id.clone(),
            message_count: state.transcript.len(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }

    /// Wait until no other turn is running on this session
    pub async fn begin_turn(&self) -> TurnGuard<'_> {
        let guard = self.turn.lock().await;
        TurnGuard {
            session: self,
            _guard: guard,
        }
    }
}

/// Exclusive right to run one turn on a session
pub struct TurnGuard<'a> {
    session: &'a Session,
    _guard: tokio::sync::MutexGuard<'a, ()>,
}

impl TurnGuard<'_> {
    /// Prior turns to send as context, limited to the trailing `max_turns`
    pub fn history(&self, max_turns: Option<usize>) -> Vec<ChatMessage> {
        self.session
            .state
            .read()
            .transcript
            .history(max_turns)
            .to_vec()
    }

    /// Append the user message and its reply, returning the completed turn count
    pub fn record_turn(self, user: impl Into<String>, assistant: impl Into<String>) -> usize {
        let mut state = self.session.state.write();
        state.transcript.record_turn(user, assistant);
        state.updated_at = Utc::now();
        state.transcript.turns()
    }
}

/// Information about a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Session id
    pub id: String,
    /// Messages recorded so far
    pub message_count: usize,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

/// Maps session ids to their transcripts
///
/// Sessions are created lazily and never evicted.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create a session
    pub fn get_or_create(&self, id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(id) {
            return session.clone();
        }

        tracing::debug!(session_id = %id, "Creating session");
        let session = Arc::new(Session::new(id));
        sessions.insert(id.to_string(), session.clone());
        session
    }

    /// Get a session if it exists
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.lock().get(id).cloned()
    }

    /// List all sessions, most recently updated first
    pub fn list(&self) -> Vec<SessionInfo> {
        let handles: Vec<SessionHandle> = self.sessions.lock().values().cloned().collect();
        let mut sessions: Vec<SessionInfo> = handles.iter().map(|s| s.info()).collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
