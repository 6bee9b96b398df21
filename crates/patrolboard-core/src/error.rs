//! Core error types for patrolboard-core.
//!
//! One thiserror enum per concern, aggregated into [`CoreError`]. Fetch
//! failures are deliberately NOT here: the poll side treats them as data
//! (see `api::types::FetchFailure`) because they are always recovered by
//! rescheduling, never surfaced as errors.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for patrolboard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Score/auth API errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Realtime channel errors
    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// No platform config directory available
    #[error("Could not determine a configuration directory")]
    NoConfigDir,

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the scoring service API (device flow and score fetches).
///
/// Only the device flow surfaces these to callers; a score fetch maps its
/// HTTP failures into the `FetchFailure` taxonomy instead.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport-level request failure
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response did not match the expected shape
    #[error("Malformed response: {0}")]
    Protocol(String),

    /// Device flow: user has not approved the code yet
    #[error("Authorization pending")]
    AuthorizationPending,

    /// Device flow: user denied the authorization
    #[error("User denied authorization")]
    AccessDenied,

    /// Device flow: the device code expired before approval
    #[error("Device code expired")]
    CodeExpired,

    /// Any other token endpoint error
    #[error("Token error: {0}")]
    Token(String),

    /// No bearer token available
    #[error("Not authenticated")]
    NotAuthenticated,
}

/// Realtime transport errors. Never fatal: the connection loop recovers
/// every one of these through backoff and reconnect.
#[derive(Error, Debug)]
pub enum RealtimeError {
    /// Handshake/connect failure
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Error on an established stream
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
