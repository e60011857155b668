//! Model gateway abstraction.
//!
//! A gateway turns a conversation transcript plus a new user message into a
//! model reply. Gateways are stateless: they never read or write the session
//! store, the caller records both turns.

mod gemini;

pub use gemini::GeminiGateway;

use async_trait::async_trait;
use chat_common::util::sanitize_for_log;
use chat_common::Error;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::Turn;

// ============================================================================
// Gateway Trait
// ============================================================================

/// Interface to an external generative model.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Gateway name, used in logs and errors.
    fn name(&self) -> &str;

    /// Model identifier requests are sent to.
    fn model(&self) -> &str;

    /// Whether an API credential is present. Does not check validity.
    fn is_configured(&self) -> bool;

    /// Send `message` with the prior `history` and return the model's reply.
    ///
    /// One round trip, no retries.
    async fn send(&self, history: &[Turn], message: &str) -> Result<ModelReply, GatewayError>;
}

/// Error from a gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// No API credential configured
    #[error("API key not configured")]
    NotConfigured,

    /// The external call failed: transport, HTTP status, API error body, or
    /// an unusable response.
    #[error("[{provider}:{model}] {message}")]
    Upstream {
        provider: String,
        model: String,
        message: String,
        status_code: Option<u16>,
    },
}

impl GatewayError {
    pub fn upstream(
        provider: impl Into<String>,
        model: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Upstream {
            provider: provider.into(),
            model: model.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// HTTP status returned by the upstream API, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotConfigured => None,
            Self::Upstream { status_code, .. } => *status_code,
        }
    }
}

impl From<GatewayError> for Error {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotConfigured => Error::Configuration(err.to_string()),
            GatewayError::Upstream { .. } => Error::Upstream(sanitize_for_log(&err.to_string())),
        }
    }
}

// ============================================================================
// Reply Types
// ============================================================================

/// A model reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReply {
    /// Generated text
    pub text: String,
    /// Token usage, when reported
    pub usage: TokenUsage,
    /// Finish reason, when reported
    pub finish_reason: Option<String>,
    /// Round-trip latency in milliseconds
    pub latency_ms: u64,
}

impl ModelReply {
    /// Reply carrying only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
            finish_reason: None,
            latency_ms: 0,
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}
