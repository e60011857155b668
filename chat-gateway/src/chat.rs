//! Chat flow: validate, record the user turn, ask the model, record the reply.

use crate::provider::ModelGateway;
use crate::session::{SessionStore, Turn};
use chat_common::util::truncate_with_ellipsis;
use chat_common::{Error, Result};
use std::sync::Arc;

/// Result of a successful chat exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatOutcome {
    pub response: String,
    pub session_id: String,
}

/// Ties the session store to a model gateway.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<SessionStore>,
    gateway: Arc<dyn ModelGateway>,
    default_session_id: String,
}

impl ChatService {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn ModelGateway>,
        default_session_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            gateway,
            default_session_id: default_session_id.into(),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Whether the gateway has a credential.
    pub fn api_configured(&self) -> bool {
        self.gateway.is_configured()
    }

    fn resolve_session(&self, session_id: Option<String>) -> String {
        session_id.unwrap_or_else(|| self.default_session_id.clone())
    }

    /// Run one exchange on a session.
    ///
    /// The session stays locked from appending the user turn until the reply
    /// is recorded. If the gateway fails, the user turn remains and no model
    /// turn is added.
    pub async fn chat(&self, message: Option<&str>, session_id: Option<String>) -> Result<ChatOutcome> {
        let message = message.map(str::trim).unwrap_or_default();
        if message.is_empty() {
            return Err(Error::Validation("Message is required".into()));
        }

        if !self.gateway.is_configured() {
            return Err(Error::Configuration("API key not configured".into()));
        }

        let session_id = self.resolve_session(session_id);
        let handle = self.store.get_or_create(&session_id).await;
        let mut turns = handle.lock().await;

        turns.push(Turn::user(message));
        let history = &turns[..turns.len() - 1];

        tracing::info!(
            session_id = %session_id,
            history_turns = history.len(),
            message = %truncate_with_ellipsis(message, 80),
            "Sending message to model"
        );

        let reply = match self.gateway.send(history, message).await {
            Ok(reply) => reply,
            Err(e) => {
                let upstream_status = e.status_code();
                let err = Error::from(e);
                tracing::error!(
                    session_id = %session_id,
                    gateway = %self.gateway.name(),
                    upstream_status = ?upstream_status,
                    error = %err,
                    "Model call failed"
                );
                return Err(err);
            }
        };

        tracing::info!(
            session_id = %session_id,
            model = %self.gateway.model(),
            latency_ms = reply.latency_ms,
            total_tokens = reply.usage.total_tokens,
            finish_reason = ?reply.finish_reason,
            "Model replied"
        );

        turns.push(Turn::model(reply.text.clone()));

        Ok(ChatOutcome {
            response: reply.text,
            session_id,
        })
    }

    /// Empty a session's history. Unknown sessions are not created.
    pub async fn clear(&self, session_id: Option<String>) -> String {
        let session_id = self.resolve_session(session_id);
        let existed = self.store.clear(&session_id).await;
        tracing::info!(session_id = %session_id, existed, "History cleared");
        session_id
    }
}
