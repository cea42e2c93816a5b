//! Error types for CheatScan workers
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - Error codes for log and metric correlation
//! - Transient/permanent classification for retry decisions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    InvalidFormat,

    // Resource errors (4xxx)
    NotFound,

    // External service errors (8xxx)
    UpstreamError,
    OracleError,
    OracleTimeout,
    QueueError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Input (1xxx)
            ErrorCode::InvalidFormat => 1003,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,

            // External (8xxx)
            ErrorCode::UpstreamError => 8001,
            ErrorCode::OracleError => 8002,
            ErrorCode::OracleTimeout => 8003,
            ErrorCode::QueueError => 8005,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Input errors
    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // External service errors
    #[error("Upstream {service} returned {status}: {message}")]
    Upstream { service: String, status: u16, message: String },

    #[error("Similarity oracle error: {message}")]
    OracleError { message: String },

    #[error("Similarity oracle timeout after {timeout_ms}ms")]
    OracleTimeout { timeout_ms: u64 },

    #[error("Queue error: {message}")]
    QueueError { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::OracleError { .. } => ErrorCode::OracleError,
            AppError::OracleTimeout { .. } => ErrorCode::OracleTimeout,
            AppError::QueueError { .. } => ErrorCode::QueueError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Upstream { status, .. } => *status == 429 || *status >= 500,
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AppError::OracleTimeout { .. } | AppError::QueueError { .. } => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string()
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string()
        }
    }
}
