//! Persistence API client abstraction
//!
//! Provides a unified interface to the contest data store:
//! - HTTP client for the REST persistence API
//! - In-memory store for local runs and tests

use crate::config::ApiConfig;
use crate::errors::{AppError, Result};
use crate::models::{
    DetectorRun, DetectorRunRequest, PlagiarismRecord, Question, Submission,
};
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Trait for the persistence collaborator
#[async_trait]
pub trait PlagiarismApi: Send + Sync {
    /// List the questions of a contest
    async fn questions_by_contest(&self, contest_slug: &str) -> Result<Vec<Question>>;

    /// List every stored submission of a question
    async fn submissions_by_question(&self, question_id: i64) -> Result<Vec<Submission>>;

    /// Create a detector run and return it with its assigned id
    async fn create_detector_run(&self, request: DetectorRunRequest) -> Result<DetectorRun>;

    /// Store a batch of plagiarism records
    async fn create_plagiarism_records(&self, records: &[PlagiarismRecord]) -> Result<()>;
}

/// REST persistence API client
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: u32,
}

impl HttpApiClient {
    /// Create a new client from configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET with exponential backoff on transient failures
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = &self.url(path);
        let attempts = &AtomicU32::new(0);

        retry(retry_policy(), move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.get_once::<T>(url, query).await {
                Ok(value) => Ok(value),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    warn!(url = %url, attempt, error = %e, "API request failed, retrying");
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        })
        .await
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.client.get(url).query(query).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Backoff schedule shared by retried requests.
///
/// The number of attempts is capped by the caller's `max_retries`, not by
/// elapsed time.
pub fn retry_policy() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_secs(10),
        max_elapsed_time: None,
        ..Default::default()
    }
}

/// Map a non-success response to an upstream error
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Upstream {
        service: "persistence-api".to_string(),
        status: status.as_u16(),
        message: body,
    })
}

#[async_trait]
impl PlagiarismApi for HttpApiClient {
    async fn questions_by_contest(&self, contest_slug: &str) -> Result<Vec<Question>> {
        let questions: Vec<Question> = self
            .get_json("questions", &[("contestSlug", contest_slug.to_string())])
            .await?;
        debug!(contest = contest_slug, count = questions.len(), "Fetched questions");
        Ok(questions)
    }

    async fn submissions_by_question(&self, question_id: i64) -> Result<Vec<Submission>> {
        let submissions: Vec<Submission> = self
            .get_json("submissions/bulk", &[("questionId", question_id.to_string())])
            .await?;
        debug!(question_id, count = submissions.len(), "Fetched submissions");
        Ok(submissions)
    }

    // Writes are not idempotent and are never retried here
    async fn create_detector_run(&self, request: DetectorRunRequest) -> Result<DetectorRun> {
        let response = self
            .client
            .post(self.url("detectorRuns"))
            .json(&request)
            .send()
            .await?;
        let run: DetectorRun = check_status(response).await?.json().await?;
        debug!(detector_run_id = run.id, question_id = run.question_id, "Created detector run");
        Ok(run)
    }

    async fn create_plagiarism_records(&self, records: &[PlagiarismRecord]) -> Result<()> {
        let response = self
            .client
            .post(self.url("plagiarisms/bulk"))
            .json(records)
            .send()
            .await?;
        check_status(response).await?;
        debug!(count = records.len(), "Stored plagiarism records");
        Ok(())
    }
}

/// In-memory persistence store for tests and dry runs
#[derive(Default)]
pub struct InMemoryApi {
    questions: Mutex<HashMap<String, Vec<Question>>>,
    submissions: Mutex<HashMap<i64, Vec<Submission>>>,
    detector_runs: Mutex<Vec<DetectorRun>>,
    record_batches: Mutex<Vec<Vec<PlagiarismRecord>>>,
    next_run_id: AtomicI64,
    fail_writes: AtomicBool,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self {
            next_run_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    /// Register the questions of a contest
    pub async fn add_contest(&self, contest_slug: &str, questions: Vec<Question>) {
        self.questions
            .lock()
            .await
            .insert(contest_slug.to_string(), questions);
    }

    /// Register the submissions of a question
    pub async fn add_submissions(&self, question_id: i64, submissions: Vec<Submission>) {
        self.submissions
            .lock()
            .await
            .entry(question_id)
            .or_default()
            .extend(submissions);
    }

    /// Make every subsequent record write fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Detector runs created so far
    pub async fn detector_runs(&self) -> Vec<DetectorRun> {
        self.detector_runs.lock().await.clone()
    }

    /// Record batches stored so far, in write order
    pub async fn record_batches(&self) -> Vec<Vec<PlagiarismRecord>> {
        self.record_batches.lock().await.clone()
    }
}

#[async_trait]
impl PlagiarismApi for InMemoryApi {
    async fn questions_by_contest(&self, contest_slug: &str) -> Result<Vec<Question>> {
        self.questions
            .lock()
            .await
            .get(contest_slug)
            .cloned()
            .ok_or_else(|| AppError::NotFound {
                resource_type: "contest".to_string(),
                id: contest_slug.to_string(),
            })
    }

    async fn submissions_by_question(&self, question_id: i64) -> Result<Vec<Submission>> {
        Ok(self
            .submissions
            .lock()
            .await
            .get(&question_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_detector_run(&self, request: DetectorRunRequest) -> Result<DetectorRun> {
        let run = DetectorRun {
            id: self.next_run_id.fetch_add(1, Ordering::SeqCst),
            detector: request.detector,
            parameters: request.parameters,
            question_id: request.question_id,
            reference_submission_id: request.reference_submission_id,
        };
        self.detector_runs.lock().await.push(run.clone());
        Ok(run)
    }

    async fn create_plagiarism_records(&self, records: &[PlagiarismRecord]) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Upstream {
                service: "in-memory".to_string(),
                status: 503,
                message: "writes disabled".to_string(),
            });
        }
        self.record_batches.lock().await.push(records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::{assert_err, assert_ok};

    /// Local HTTP server answering every request with 503, counting GETs and POSTs
    async fn unavailable_server() -> (String, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let gets = Arc::new(AtomicUsize::new(0));
        let posts = Arc::new(AtomicUsize::new(0));

        let (get_count, post_count) = (gets.clone(), posts.clone());
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let (get_count, post_count) = (get_count.clone(), post_count.clone());
                tokio::spawn(async move {
                    let head = read_request(&mut socket).await;
                    if head.starts_with("GET ") {
                        get_count.fetch_add(1, Ordering::SeqCst);
                    } else if head.starts_with("POST ") {
                        post_count.fetch_add(1, Ordering::SeqCst);
                    }
                    let _ = socket
                        .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (format!("http://{}", addr), gets, posts)
    }

    /// Read one request (head and body) and return its head
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return String::from_utf8_lossy(&buf).to_string();
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_string();
                let body_len = head
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return head;
                }
            }
        }
    }

    fn question(id: i64) -> Question {
        Question {
            id,
            name: format!("q{}", id),
            number: None,
            number_in_contest: None,
            contest_id: None,
        }
    }

    #[test]
    fn test_url_joining() {
        let client = HttpApiClient::new(&ApiConfig {
            base_url: "http://api.local/api/v1/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.url("/detectorRuns"), "http://api.local/api/v1/detectorRuns");
        assert_eq!(client.url("plagiarisms/bulk"), "http://api.local/api/v1/plagiarisms/bulk");
    }

    #[tokio::test]
    async fn test_in_memory_assigns_run_ids() {
        let api = InMemoryApi::new();
        let request = DetectorRunRequest {
            detector: "copydetect".to_string(),
            parameters: "{}".to_string(),
            question_id: 5,
            reference_submission_id: Some(9),
        };
        let first = api.create_detector_run(request.clone()).await.unwrap();
        let second = api.create_detector_run(request).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.reference_submission_id, Some(9));
        assert_eq!(api.detector_runs().await.len(), 2);
    }

    #[tokio::test]
    async fn test_in_memory_contest_lookup() {
        let api = InMemoryApi::new();
        api.add_contest("weekly-1", vec![question(1), question(2)]).await;

        let questions = assert_ok!(api.questions_by_contest("weekly-1").await);
        assert_eq!(questions.len(), 2);
        assert_err!(api.questions_by_contest("weekly-2").await);
        assert!(api.submissions_by_question(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_write_failure() {
        let api = InMemoryApi::new();
        api.fail_writes(true);
        let err = api.create_plagiarism_records(&[]).await.unwrap_err();
        assert!(err.is_transient());
        assert!(api.record_batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_are_retried_and_writes_are_not() {
        let (base_url, gets, posts) = unavailable_server().await;
        let client = HttpApiClient::new(&ApiConfig {
            base_url,
            max_retries: 2,
            ..Default::default()
        })
        .unwrap();

        let err = client.questions_by_contest("weekly-1").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(gets.load(Ordering::SeqCst), 3);

        let record = PlagiarismRecord {
            submission_ids: vec![1, 2, 3, 4],
            confidence_percentage: 90,
            detector_run_id: 1,
            language: "python3".to_string(),
        };
        assert_err!(client.create_plagiarism_records(&[record]).await);
        assert_eq!(posts.load(Ordering::SeqCst), 1);

        let request = DetectorRunRequest {
            detector: "copydetect".to_string(),
            parameters: "{}".to_string(),
            question_id: 5,
            reference_submission_id: None,
        };
        assert_err!(client.create_detector_run(request).await);
        assert_eq!(posts.load(Ordering::SeqCst), 2);
        assert_eq!(gets.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retry_policy_is_bounded_by_attempts() {
        let policy = retry_policy();
        assert_eq!(policy.initial_interval, Duration::from_millis(200));
        assert!(policy.max_elapsed_time.is_none());
    }
}
