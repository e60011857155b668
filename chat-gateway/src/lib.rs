//! Chat Gateway - conversational relay to the Gemini API.
//!
//! This crate provides:
//! - An in-memory, per-session conversation store
//! - A stateless model gateway (Gemini over HTTP)
//! - The chat flow that ties the two together
//! - HTTP routes for chat, clear, health, and the static chat page
//!
//! ## Architecture
//!
//! ```text
//! Client → /api/chat → ChatService ── lock session, append user turn
//!                          │
//!                          ├─→ ModelGateway::send(history, message) → Gemini
//!                          │
//!                          └── append model turn, unlock → reply
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod chat;
pub mod provider;
pub mod routes;
pub mod session;

pub use chat::{ChatOutcome, ChatService};
pub use provider::{GatewayError, GeminiGateway, ModelGateway, ModelReply, TokenUsage};
pub use routes::AppState;
pub use session::{Role, SessionHandle, SessionStore, Turn};

use axum::Router;
use chat_common::config::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Build the router with all routes and middleware.
pub fn build_router(config: &Config) -> Router {
    with_middleware(routes::build_all_routes(config), config)
}

/// Build the router around existing state, with middleware.
pub fn build_router_with_state(config: &Config, state: AppState) -> Router {
    with_middleware(routes::build_all_routes_with_state(config, state), config)
}

fn with_middleware(router: Router, config: &Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Load `.env` from the working directory or one of its parents.
///
/// A missing file is not an error. Any other failure (unreadable file, bad
/// line) is returned so the caller can log it once logging is set up.
pub fn load_env_file() -> Option<dotenvy::Error> {
    env_file_error(dotenvy::dotenv())
}

fn env_file_error<T>(result: dotenvy::Result<T>) -> Option<dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

/// Start the chat server and run until Ctrl-C.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.listen_address()?;

    let router = build_router(config);

    tracing::info!(
        address = %addr,
        model = %config.gemini.model,
        static_dir = %config.server.static_path().display(),
        "Starting chat gateway"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Chat gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_env_file_is_not_reported() {
        let dir = TempDir::new().unwrap();
        let result = dotenvy::from_path(dir.path().join(".env"));
        assert!(env_file_error(result).is_none());
    }

    #[test]
    fn unparsable_env_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "this line has no equals sign\n").unwrap();

        let err = env_file_error(dotenvy::from_path(&path)).expect("parse error");
        assert!(!err.not_found());
    }
}
