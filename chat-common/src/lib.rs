//! Chat Common - Shared types, utilities, and configuration for the chat backend.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and HTTP status mapping
//! - Logging setup
//! - String helpers for log-safe output

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{Config, GeminiConfig, ObservabilityConfig, ServerConfig, SessionConfig};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};

