//! Configuration management for CheatScan workers
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use crate::errors::{AppError, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Persistence API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Similarity oracle configuration
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Detector tunables
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Queue configuration (SQS)
    #[serde(default)]
    pub queue: QueueSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Base URL of the persistence API (including the version prefix)
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for read requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
    /// Oracle provider: http, static
    #[serde(default = "default_oracle_provider")]
    pub provider: String,

    /// Oracle service URL
    #[serde(default = "default_oracle_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Tunables of one detector, passed explicitly to the clustering orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorConfig {
    /// Detector name recorded on the detector run
    #[serde(default = "default_detector_name")]
    pub name: String,

    /// Minimum cluster size to emit
    #[serde(default = "default_group_size_threshold")]
    pub group_size_threshold: usize,

    /// Minimum value required on both directions of an edge
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Language groups clustered concurrently per question
    #[serde(default = "default_max_concurrent_groups")]
    pub max_concurrent_groups: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueSettings {
    /// SQS contest queue URL
    pub contest_queue_url: Option<String>,

    /// SQS contest queue name, resolved to a URL at startup
    pub contest_queue_name: Option<String>,

    /// Maximum messages to receive per poll
    #[serde(default = "default_queue_batch_size")]
    pub batch_size: i32,

    /// Long polling timeout in seconds
    #[serde(default = "default_queue_poll_timeout")]
    pub poll_timeout_secs: i32,

    /// Visibility timeout in seconds
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_api_base_url() -> String { "http://localhost:8080/api/v1".to_string() }
fn default_api_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_oracle_provider() -> String { "http".to_string() }
fn default_oracle_url() -> String { "http://localhost:5000".to_string() }
fn default_oracle_timeout() -> u64 { 120 }
fn default_detector_name() -> String { crate::DEFAULT_DETECTOR_NAME.to_string() }
fn default_group_size_threshold() -> usize { crate::DEFAULT_GROUP_SIZE_THRESHOLD }
fn default_similarity_threshold() -> f64 { crate::DEFAULT_SIMILARITY_THRESHOLD }
fn default_max_concurrent_groups() -> usize { 4 }
fn default_queue_batch_size() -> i32 { 10 }
fn default_queue_poll_timeout() -> i32 { 20 }
fn default_visibility_timeout() -> i32 { 900 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_service_name() -> String { "cheatscan-detector".to_string() }

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__DETECTOR__SIMILARITY_THRESHOLD=0.85
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }
}

impl DetectorConfig {
    /// Reject tunables the clustering engine cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.group_size_threshold == 0 {
            return Err(AppError::Configuration {
                message: "detector.group_size_threshold must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(AppError::Configuration {
                message: format!(
                    "detector.similarity_threshold must be within [0, 1], got {}",
                    self.similarity_threshold
                ),
            });
        }
        if self.max_concurrent_groups == 0 {
            return Err(AppError::Configuration {
                message: "detector.max_concurrent_groups must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Serialized tunables stored on the detector run
    pub fn parameters(&self) -> String {
        #[derive(Serialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        struct Parameters {
            group_size_threshold: usize,
            similarity_threshold: f64,
        }

        let params = Parameters {
            group_size_threshold: self.group_size_threshold,
            similarity_threshold: self.similarity_threshold,
        };
        // A struct of two plain numbers always serializes
        serde_json::to_string(&params).unwrap_or_default()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_secs: default_api_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: default_oracle_provider(),
            url: default_oracle_url(),
            timeout_secs: default_oracle_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            name: default_detector_name(),
            group_size_threshold: default_group_size_threshold(),
            similarity_threshold: default_similarity_threshold(),
            max_concurrent_groups: default_max_concurrent_groups(),
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            contest_queue_url: None,
            contest_queue_name: None,
            batch_size: default_queue_batch_size(),
            poll_timeout_secs: default_queue_poll_timeout(),
            visibility_timeout_secs: default_visibility_timeout(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
            service_name: default_service_name(),
        }
    }
}
