//! CheatScan Common Library
//! 
//! Shared code for the CheatScan workers including:
//! - Data model for questions, submissions, detector runs and plagiarism records
//! - Persistence API client abstraction
//! - Error types and handling
//! - Configuration management
//! - SQS queue integration
//! - Metrics and observability

pub mod api;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod queue;

// Re-export commonly used types
pub use crate::api::PlagiarismApi;
pub use crate::config::{AppConfig, DetectorConfig};
pub use crate::errors::{AppError, Result};
pub use crate::models::{DetectorRun, PlagiarismRecord, Question, Submission, SubmissionId};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default detector name recorded on every detector run
pub const DEFAULT_DETECTOR_NAME: &str = "copydetect";

/// Default minimum cluster size to emit
pub const DEFAULT_GROUP_SIZE_THRESHOLD: usize = 4;

/// Default minimum similarity required on both directions of an edge
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;
