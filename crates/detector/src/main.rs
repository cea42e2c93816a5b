//! CheatScan Detector Worker
//!
//! Processes contests either directly or from the SQS contest queue:
//! 1. Fetches the contest's questions and submissions
//! 2. Clusters each question's submissions per language
//! 3. Writes plagiarism records tied to one detector run per question
//! 4. Acknowledges the queue message

use anyhow::Context;
use cheatscan_common::{
    api::HttpApiClient,
    config::AppConfig,
    metrics,
    queue::{ContestJobMessage, Queue, QueueConfig},
    VERSION,
};
use cheatscan_detector::{create_oracle, ClusteringOrchestrator};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    init_tracing(&config);

    info!("Starting CheatScan Detector v{}", VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Suffix("oracle_duration_seconds".to_string()),
                metrics::ORACLE_BUCKETS,
            )?
            .install()
            .context("Failed to install Prometheus exporter")?;
        metrics::register_metrics();
        info!(%addr, "Metrics exporter listening");
    }

    let api = Arc::new(HttpApiClient::new(&config.api)?);
    let oracle = create_oracle(&config.oracle)?;
    info!(
        oracle = oracle.name(),
        api = %config.api.base_url,
        "Collaborators initialized"
    );

    let orchestrator = ClusteringOrchestrator::new(api, oracle, config.detector.clone())?;

    // Direct mode: a single contest from the environment
    if let Ok(contest_slug) = std::env::var("CONTEST_SLUG") {
        info!(contest = %contest_slug, "Found CONTEST_SLUG, processing contest directly");
        orchestrator.process_contest(&contest_slug).await?;
        return Ok(());
    }

    info!("CONTEST_SLUG not set, reading contests from the queue");

    let queue = if let Some(url) = config.queue.contest_queue_url.clone() {
        Queue::new(QueueConfig::from_settings(url, &config.queue)).await?
    } else if let Some(name) = config
        .queue
        .contest_queue_name
        .clone()
        .or_else(|| std::env::var("QUEUE_NAME").ok())
    {
        Queue::from_name(&name, &config.queue).await?
    } else {
        error!("No contest queue configured (queue.contest_queue_url, queue.contest_queue_name or QUEUE_NAME)");
        return Ok(());
    };

    let messages = queue.receive().await?;
    if messages.is_empty() {
        warn!(queue = %queue.url(), "No message in the contest queue");
        return Ok(());
    }

    for message in messages {
        let job: ContestJobMessage = match Queue::parse_message(&message) {
            Ok(job) => job,
            Err(e) => {
                // Redelivery cannot fix a malformed body
                error!(error = %e, "Dropping unreadable contest message");
                if let Some(receipt_handle) = message.receipt_handle() {
                    if let Err(e) = queue.delete(receipt_handle).await {
                        error!(error = %e, "Failed to delete message");
                    }
                }
                continue;
            }
        };

        match orchestrator.process_contest(&job.contest_slug).await {
            Ok(outcomes) => {
                let failed: usize = outcomes.iter().map(|o| o.failures.len()).sum();
                info!(
                    contest = %job.contest_slug,
                    questions = outcomes.len(),
                    failed_language_groups = failed,
                    "Contest job completed"
                );
                if let Some(receipt_handle) = message.receipt_handle() {
                    if let Err(e) = queue.delete(receipt_handle).await {
                        error!(error = %e, "Failed to delete message");
                    }
                }
            }
            Err(e) => {
                // Message will be re-delivered once its visibility timeout expires
                error!(
                    contest = %job.contest_slug,
                    error = %e,
                    "Failed to process contest job"
                );
            }
        }
    }

    info!("Detector shutting down");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
