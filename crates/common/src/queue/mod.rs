//! SQS Queue integration for contest jobs
//!
//! Provides:
//! - SQS client wrapper (resolve by URL or by name)
//! - Message serialization/deserialization
//! - Acknowledgment by deletion

use crate::config::QueueSettings;
use crate::errors::{AppError, Result};
use aws_sdk_sqs::types::Message;
use aws_sdk_sqs::Client as SqsClient;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

/// SQS queue configuration
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Queue URL
    pub url: String,
    /// Visibility timeout in seconds
    pub visibility_timeout: i32,
    /// Wait time for long polling (seconds)
    pub wait_time_seconds: i32,
    /// Maximum number of messages per poll
    pub max_messages: i32,
}

impl QueueConfig {
    /// Build from application settings with an already resolved URL
    pub fn from_settings(url: String, settings: &QueueSettings) -> Self {
        Self {
            url,
            visibility_timeout: settings.visibility_timeout_secs,
            wait_time_seconds: settings.poll_timeout_secs,
            // SQS accepts 1..=10 messages per receive
            max_messages: settings.batch_size.clamp(1, 10),
        }
    }
}

/// SQS Queue client wrapper
pub struct Queue {
    client: SqsClient,
    config: QueueConfig,
}

impl Queue {
    /// Create a new queue client
    pub async fn new(config: QueueConfig) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);

        Ok(Self { client, config })
    }

    /// Create a client for the queue with the given name
    pub async fn from_name(name: &str, settings: &QueueSettings) -> Result<Self> {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = SqsClient::new(&aws_config);

        let output = client
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to resolve queue {}: {}", name, e),
            })?;
        let url = output.queue_url.ok_or_else(|| AppError::QueueError {
            message: format!("Queue {} has no URL", name),
        })?;

        debug!(queue = name, url = %url, "Resolved queue URL");
        Ok(Self::with_client(client, QueueConfig::from_settings(url, settings)))
    }

    /// Create with existing AWS client
    pub fn with_client(client: SqsClient, config: QueueConfig) -> Self {
        Self { client, config }
    }

    /// Queue URL
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Receive messages from the queue
    pub async fn receive(&self) -> Result<Vec<Message>> {
        let result = self.client
            .receive_message()
            .queue_url(&self.config.url)
            .max_number_of_messages(self.config.max_messages)
            .visibility_timeout(self.config.visibility_timeout)
            .wait_time_seconds(self.config.wait_time_seconds)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to receive messages: {}", e),
            })?;

        let messages = result.messages.unwrap_or_default();
        debug!(count = messages.len(), "Received messages from queue");

        Ok(messages)
    }

    /// Delete a message after processing
    pub async fn delete(&self, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.config.url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| AppError::QueueError {
                message: format!("Failed to delete message: {}", e),
            })?;

        debug!("Message deleted from queue");
        Ok(())
    }

    /// Parse message body as JSON
    pub fn parse_message<T: DeserializeOwned>(message: &Message) -> Result<T> {
        let body = message.body.as_ref().ok_or_else(|| AppError::QueueError {
            message: "Message has no body".to_string(),
        })?;

        parse_body(body)
    }
}

/// Parse a raw message body as JSON
pub fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| AppError::InvalidFormat {
        message: format!("Failed to parse message: {}", e),
    })
}

/// Contest processing job message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestJobMessage {
    #[serde(rename = "contest-slug")]
    pub contest_slug: String,
}
