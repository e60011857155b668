//! Error types for the chat backend.

use thiserror::Error;

/// Result type alias using the chat error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for request handling.
///
/// Each variant maps to one HTTP status and one stable `code` string.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input or request (empty message, malformed body)
    #[error("{0}")]
    Validation(String),

    /// Required configuration is missing (no API credential)
    #[error("{0}")]
    Configuration(String),

    /// The external model API failed
    #[error("{0}")]
    Upstream(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Configuration(_) | Self::Upstream(_) => 500,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::Validation("test".into()).status_code(), 400);
        assert_eq!(Error::Configuration("test".into()).status_code(), 500);
        assert_eq!(Error::Upstream("test".into()).status_code(), 500);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::Validation("x".into()).code(), "VALIDATION_ERROR");
        assert_eq!(Error::Configuration("x".into()).code(), "CONFIGURATION_ERROR");
        assert_eq!(Error::Upstream("x".into()).code(), "UPSTREAM_ERROR");
    }

    #[test]
    fn test_error_display_is_bare_message() {
        let err = Error::Validation("Message is required".into());
        assert_eq!(err.to_string(), "Message is required");
        let err = Error::Upstream("API error (429): quota".into());
        assert_eq!(err.to_string(), "API error (429): quota");
    }
}
