//! Similarity oracle abstraction
//!
//! The oracle compares every pair of submissions of one language and reports
//! both directional similarity scores. It does not filter by threshold.
//! Providers:
//! - HTTP similarity service
//! - Static canned judgments (tests and dry runs)

use async_trait::async_trait;
use backoff::future::retry;
use cheatscan_common::api::retry_policy;
use cheatscan_common::config::OracleConfig;
use cheatscan_common::errors::{AppError, Result};
use cheatscan_common::SubmissionId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Oracle input: one submission's code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleInput {
    pub id: SubmissionId,
    pub code: String,
}

/// Raw oracle tuple `(sim1, sim2, id1, id2)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawJudgment(pub f64, pub f64, pub SubmissionId, pub SubmissionId);

/// Asymmetric similarity between two submissions.
///
/// `sim_a` is how much of A appears derived from B, independently of `sim_b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityJudgment {
    pub sub_a: SubmissionId,
    pub sub_b: SubmissionId,
    pub sim_a: f64,
    pub sim_b: f64,
}

impl From<RawJudgment> for SimilarityJudgment {
    fn from(raw: RawJudgment) -> Self {
        let RawJudgment(sim_a, sim_b, sub_a, sub_b) = raw;
        Self { sub_a, sub_b, sim_a, sim_b }
    }
}

impl SimilarityJudgment {
    pub fn new(sub_a: SubmissionId, sub_b: SubmissionId, sim_a: f64, sim_b: f64) -> Self {
        Self { sub_a, sub_b, sim_a, sim_b }
    }

    /// Both ids distinct and both scores finite within [0, 1]
    pub fn is_well_formed(&self) -> bool {
        let in_range = |s: f64| (0.0..=1.0).contains(&s);
        self.sub_a != self.sub_b && in_range(self.sim_a) && in_range(self.sim_b)
    }

    /// Both directions strictly exceed the threshold
    pub fn qualifies(&self, threshold: f64) -> bool {
        self.sim_a > threshold && self.sim_b > threshold
    }
}

/// Trait for pairwise similarity computation
#[async_trait]
pub trait SimilarityOracle: Send + Sync {
    /// Compare every pair of the given submissions of one language
    async fn compare(&self, language: &str, submissions: &[OracleInput]) -> Result<Vec<RawJudgment>>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// HTTP similarity service client
pub struct HttpSimilarityOracle {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct CompareRequest<'a> {
    language: &'a str,
    submissions: &'a [OracleInput],
}

#[derive(Deserialize)]
struct CompareResponse {
    pairs: Vec<RawJudgment>,
}

impl HttpSimilarityOracle {
    /// Create a new oracle client
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            timeout,
        })
    }

    /// Make request with exponential backoff on transient failures
    async fn request_with_retry(&self, language: &str, submissions: &[OracleInput]) -> Result<Vec<RawJudgment>> {
        let attempts = &AtomicU32::new(0);

        retry(retry_policy(), move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.make_request(language, submissions).await {
                Ok(pairs) => Ok(pairs),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    warn!(
                        attempt,
                        max_retries = self.max_retries,
                        language,
                        error = %e,
                        "Oracle request failed, retrying"
                    );
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    async fn make_request(&self, language: &str, submissions: &[OracleInput]) -> Result<Vec<RawJudgment>> {
        let url = format!("{}/compare", self.base_url);

        let response = self.client
            .post(&url)
            .json(&CompareRequest { language, submissions })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::OracleTimeout {
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    AppError::HttpClient(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                service: "similarity-oracle".to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        let result: CompareResponse = response.json().await.map_err(|e| {
            AppError::OracleError {
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        Ok(result.pairs)
    }
}

#[async_trait]
impl SimilarityOracle for HttpSimilarityOracle {
    async fn compare(&self, language: &str, submissions: &[OracleInput]) -> Result<Vec<RawJudgment>> {
        if submissions.len() < 2 {
            return Ok(Vec::new());
        }
        self.request_with_retry(language, submissions).await
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Oracle returning canned judgments per language
#[derive(Debug, Clone, Default)]
pub struct StaticOracle {
    judgments: HashMap<String, Vec<RawJudgment>>,
    failing: HashSet<String>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `language` with the given judgments
    pub fn with_judgments(mut self, language: &str, judgments: Vec<RawJudgment>) -> Self {
        self.judgments.insert(language.to_string(), judgments);
        self
    }

    /// Fail every comparison for `language`
    pub fn failing_for(mut self, language: &str) -> Self {
        self.failing.insert(language.to_string());
        self
    }
}

#[async_trait]
impl SimilarityOracle for StaticOracle {
    async fn compare(&self, language: &str, _submissions: &[OracleInput]) -> Result<Vec<RawJudgment>> {
        if self.failing.contains(language) {
            return Err(AppError::OracleError {
                message: format!("no comparison available for {}", language),
            });
        }
        Ok(self.judgments.get(language).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// Create an oracle based on configuration
pub fn create_oracle(config: &OracleConfig) -> Result<Arc<dyn SimilarityOracle>> {
    match config.provider.as_str() {
        "http" => Ok(Arc::new(HttpSimilarityOracle::new(config)?)),
        "static" => {
            warn!("Static oracle configured, every comparison returns no pairs");
            Ok(Arc::new(StaticOracle::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown oracle provider: {}", other),
        }),
    }
}
