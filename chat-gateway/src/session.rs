//! In-memory conversation history, keyed by session id.
//!
//! Sessions are created lazily, emptied (never removed) on clear, and live
//! for the lifetime of the process. There is no eviction.
//!
//! Locking is per session: the map sits behind an `RwLock` that is only held
//! long enough to look up or insert a handle, and each session's turns sit
//! behind their own `Mutex`. A chat request keeps its session locked across
//! the upstream call, so turns within one session never interleave while
//! separate sessions run in parallel.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Speaker of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Shared, lockable turn sequence of a single session.
pub type SessionHandle = Arc<Mutex<Vec<Turn>>>;

/// Process-wide session store.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session's turns, inserting an empty sequence if it is new.
    pub async fn get_or_create(&self, session_id: &str) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %session_id, "Created session");
                SessionHandle::default()
            })
            .clone()
    }

    /// Empty a session's turns. Unknown sessions are left alone.
    ///
    /// Returns whether the session existed.
    pub async fn clear(&self, session_id: &str) -> bool {
        let handle = self.sessions.read().await.get(session_id).cloned();

        match handle {
            Some(handle) => {
                handle.lock().await.clear();
                true
            }
            None => false,
        }
    }

    /// Snapshot of a session's turns, or `None` if it was never created.
    pub async fn history(&self, session_id: &str) -> Option<Vec<Turn>> {
        let handle = self.sessions.read().await.get(session_id).cloned()?;
        let turns = handle.lock().await;
        Some(turns.clone())
    }

    /// Number of sessions created so far.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
