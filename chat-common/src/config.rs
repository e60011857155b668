//! Configuration management for the chat backend.
//!
//! Configuration lives in `~/.gemini-chat/config.json` (or the file named by
//! `GEMINI_CHAT_CONFIG`). Every field has a default, so the file is optional.
//!
//! # Configuration Priority
//!
//! 1. Environment variables
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `GEMINI_API_KEY` → gemini.api_key
//! - `GEMINI_MODEL` → gemini.model
//! - `GEMINI_CHAT_BIND_ADDRESS` → server.bind
//! - `GEMINI_CHAT_PORT` → server.port
//! - `GEMINI_CHAT_STATIC_DIR` → server.static_dir
//! - `GEMINI_CHAT_LOG_LEVEL` → observability.log_level
//! - `GEMINI_CHAT_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "GEMINI_CHAT_CONFIG";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".gemini-chat"),
        |dirs| dirs.home_dir().join(".gemini-chat"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(shellexpand::tilde(&path).as_ref()),
        _ => config_dir().join("config.json"),
    }
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address. Default is `127.0.0.1` (local only).
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the chat page and its assets
    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            static_dir: default_static_dir(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerConfig {
    /// Static directory with `~` expanded.
    pub fn static_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.static_dir).as_ref())
    }
}

fn default_bind() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    5000
}

fn default_static_dir() -> String {
    "static".into()
}

fn default_body_limit() -> usize {
    1024 * 1024
}

// ============================================================================
// Gemini Configuration
// ============================================================================

/// Upstream Gemini API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API credential. Absence is a valid, degraded state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL (without the `/models/...` suffix)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Sampling temperature; omitted from requests when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Output token cap; omitted from requests when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,

    /// System instruction sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            temperature: None,
            max_output_tokens: None,
            system_prompt: None,
        }
    }
}

impl GeminiConfig {
    /// The API key, treating blank strings as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Whether a credential is present. Says nothing about validity.
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_connect_timeout_secs() -> u64 {
    10
}

// ============================================================================
// Session Configuration
// ============================================================================

/// Conversation session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session key used when a request omits `session_id`
    #[serde(default = "default_session_id")]
    pub default_session_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_session_id: default_session_id(),
        }
    }
}

fn default_session_id() -> String {
    "default".into()
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets to force to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: vec![],
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,

    /// Upstream model API
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Conversation sessions
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path. A missing file yields defaults.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides applied.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }

        if let Some(bind) = lookup("GEMINI_CHAT_BIND_ADDRESS") {
            self.server.bind = bind;
        }
        if let Some(port) = lookup("GEMINI_CHAT_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid GEMINI_CHAT_PORT"),
            }
        }
        if let Some(dir) = lookup("GEMINI_CHAT_STATIC_DIR") {
            self.server.static_dir = dir;
        }

        if let Some(level) = lookup("GEMINI_CHAT_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("GEMINI_CHAT_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// The socket address the server listens on.
    pub fn listen_address(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .server
            .bind
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.server.bind))?;
        Ok(SocketAddr::from((ip, self.server.port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.static_dir, "static");
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(
            config.gemini.base_url,
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(config.session.default_session_id, "default");
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.gemini.is_configured());
        assert_eq!(
            config.listen_address().unwrap(),
            SocketAddr::from(([127, 0, 0, 1], 5000))
        );
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"server": {"port": 8080}, "gemini": {"model": "gemini-1.5-pro"}, "observability": {"level": "debug"}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.gemini.model, "gemini-1.5-pro");
        assert_eq!(config.gemini.timeout_secs, 120);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.session.default_session_id, "default");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ server: ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[
            ("GEMINI_API_KEY", "abc123"),
            ("GEMINI_MODEL", "gemini-1.5-flash"),
            ("GEMINI_CHAT_BIND_ADDRESS", "0.0.0.0"),
            ("GEMINI_CHAT_PORT", "8088"),
            ("GEMINI_CHAT_STATIC_DIR", "/srv/chat"),
            ("GEMINI_CHAT_LOG_LEVEL", "debug"),
            ("GEMINI_CHAT_LOG_FORMAT", "json"),
        ]));

        assert_eq!(config.gemini.api_key(), Some("abc123"));
        assert_eq!(config.gemini.model, "gemini-1.5-flash");
        assert_eq!(
            config.listen_address().unwrap(),
            SocketAddr::from(([0, 0, 0, 0], 8088))
        );
        assert_eq!(config.server.static_dir, "/srv/chat");
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, "json");
    }

    #[test]
    fn test_hostname_bind_has_no_listen_address() {
        let mut config = Config::default();
        config.server.bind = "localhost".into();

        let err = config.listen_address().unwrap_err();
        assert!(err.to_string().contains("Invalid bind address 'localhost'"));
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[("GEMINI_CHAT_PORT", "not-a-port")]));
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_blank_api_key_is_not_configured() {
        let mut config = Config::default();
        config.apply_overrides_from(lookup_from(&[("GEMINI_API_KEY", "   ")]));
        assert!(config.gemini.api_key.is_some());
        assert!(config.gemini.api_key().is_none());
        assert!(!config.gemini.is_configured());
    }

    #[test]
    fn test_api_key_not_serialized_when_absent() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(!json.contains("api_key"));
    }
}
