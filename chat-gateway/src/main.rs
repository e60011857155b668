//! Chat Gateway - Main entry point.

use anyhow::Result;
use chat_common::config::Config;
use chat_common::logging::init_logging;
use chat_common::Validate;

#[tokio::main]
async fn main() -> Result<()> {
    let env_file_error = chat_gateway::load_env_file();

    let config = Config::load_with_env()?;

    init_logging(&config.observability);

    if let Some(e) = env_file_error {
        tracing::debug!(error = %e, "Ignoring unreadable .env file");
    }

    tracing::info!("Chat Gateway v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    if !config.gemini.is_configured() {
        tracing::warn!("GEMINI_API_KEY is not set; /api/chat will fail until it is configured");
    }

    chat_gateway::start_server(&config).await
}
