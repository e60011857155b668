//! Route definitions for the chat backend.
//!
//! Provides the chat, clear and health endpoints, plus the chat page at `/`
//! and its assets under `/static`.

use crate::chat::ChatService;
use crate::provider::{GeminiGateway, ModelGateway};
use crate::session::SessionStore;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, get_service, post},
    Router,
};
use chat_common::config::Config;
use chat_common::logging::generate_request_id;
use chat_common::Error;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tracing::Instrument;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
}

impl AppState {
    /// Build state around a fresh session store.
    pub fn new(config: &Config, gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            chat: ChatService::new(
                Arc::new(SessionStore::new()),
                gateway,
                config.session.default_session_id.clone(),
            ),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.chat.store()
    }
}

/// Chat request body.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Chat response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// Clear request body.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Clear response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub message: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub api_configured: bool,
    pub service: String,
    pub version: String,
}

/// Request-boundary error: maps the error taxonomy onto HTTP.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::Validation(format!("Invalid request body: {}", rejection.body_text())))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code().into(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the complete router backed by the Gemini gateway.
pub fn build_all_routes(config: &Config) -> Router {
    let gateway: Arc<dyn ModelGateway> = Arc::new(GeminiGateway::new(&config.gemini));
    build_all_routes_with_state(config, AppState::new(config, gateway))
}

/// Build the complete router around existing state.
/// This is useful for testing with a stub gateway.
pub fn build_all_routes_with_state(config: &Config, state: AppState) -> Router {
    let static_dir = config.server.static_path();
    let index = static_dir.join("index.html");

    // The page lives at `/` and its assets under `/static`. Anything else is
    // a plain 404.
    Router::new()
        .merge(api_routes())
        .merge(health_routes())
        .route("/", get_service(ServeFile::new(index)))
        .with_state(state)
        .nest_service("/static", ServeDir::new(static_dir))
}

/// Build chat API routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/clear", post(clear_handler))
}

/// Build health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Send a message and return the model's reply.
async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Rejected chat request body");
        ApiError::from(rejection)
    })?;

    let request_id = generate_request_id();
    let span = chat_common::request_span!("chat", request_id);

    let outcome = state
        .chat
        .chat(request.message.as_deref(), request.session_id)
        .instrument(span)
        .await?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        session_id: outcome.session_id,
    }))
}

/// Clear a session's history. The body is optional.
async fn clear_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ClearResponse>, ApiError> {
    let request: ClearRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ClearRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))?
    };

    state.chat.clear(request.session_id).await;

    Ok(Json(ClearResponse {
        message: "History cleared".into(),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Health Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Health check handler. Reports credential presence, not validity.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        api_configured: state.chat.api_configured(),
        service: "chat-gateway".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_400() {
        let response = ApiError(Error::Validation("Message is required".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_configuration_and_upstream_map_to_500() {
        let response = ApiError(Error::Configuration("API key not configured".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError(Error::Upstream("boom".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_chat_request_fields_optional() {
        let request: ChatRequest = serde_json::from_str("{}").unwrap();
        assert!(request.message.is_none());
        assert!(request.session_id.is_none());

        let request: ChatRequest =
            serde_json::from_str(r#"{"message": "hi", "session_id": null}"#).unwrap();
        assert_eq!(request.message.as_deref(), Some("hi"));
        assert!(request.session_id.is_none());
    }
}
