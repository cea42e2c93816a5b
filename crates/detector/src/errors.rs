//! Detector error types

use cheatscan_common::errors::{AppError, ErrorCode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Persistence API error: {0}")]
    Persistence(#[source] AppError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<AppError> for DetectorError {
    fn from(e: AppError) -> Self {
        match e.code() {
            ErrorCode::ConfigurationError => DetectorError::Config(e.to_string()),
            _ => DetectorError::Persistence(e),
        }
    }
}
