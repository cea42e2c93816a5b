//! Clustering orchestrator
//!
//! Drives one question end to end: creates the shared detector run, clusters
//! every language group concurrently and persists the combined record batch.

use crate::errors::DetectorError;
use crate::grouping::ClusteringUnit;
use crate::oracle::{OracleInput, SimilarityJudgment, SimilarityOracle};
use cheatscan_common::config::DetectorConfig;
use cheatscan_common::errors::AppError;
use cheatscan_common::metrics;
use cheatscan_common::models::{DetectorRunId, DetectorRunRequest};
use cheatscan_common::{DetectorRun, PlagiarismApi, PlagiarismRecord, Question, Submission, SubmissionId};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// A language group whose oracle call failed
#[derive(Debug)]
pub struct LanguageFailure {
    pub language: String,
    pub error: AppError,
}

/// Result of clustering every language group of a question
#[derive(Debug, Default)]
pub struct ClusteringOutcome {
    pub records: Vec<PlagiarismRecord>,
    pub failures: Vec<LanguageFailure>,
    pub skipped_languages: Vec<String>,
}

/// Result of processing one question
#[derive(Debug)]
pub struct QuestionOutcome {
    pub detector_run: DetectorRun,
    /// Records persisted for the question
    pub records: Vec<PlagiarismRecord>,
    pub failures: Vec<LanguageFailure>,
    pub skipped_languages: Vec<String>,
}

enum UnitResult {
    Skipped,
    Clustered(Vec<PlagiarismRecord>),
    Failed(AppError),
}

/// Clustering orchestrator
pub struct ClusteringOrchestrator {
    api: Arc<dyn PlagiarismApi>,
    oracle: Arc<dyn SimilarityOracle>,
    config: DetectorConfig,
}

impl ClusteringOrchestrator {
    pub fn new(
        api: Arc<dyn PlagiarismApi>,
        oracle: Arc<dyn SimilarityOracle>,
        config: DetectorConfig,
    ) -> Result<Self, DetectorError> {
        config.validate()?;
        Ok(Self { api, oracle, config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Process every question of a contest
    #[instrument(skip(self))]
    pub async fn process_contest(&self, contest_slug: &str) -> Result<Vec<QuestionOutcome>, DetectorError> {
        info!("Processing contest");

        let questions = self.api.questions_by_contest(contest_slug).await?;
        let mut outcomes = Vec::with_capacity(questions.len());

        for question in questions {
            let submissions = self.api.submissions_by_question(question.id).await?;
            info!(
                question = %question.name,
                submissions = submissions.len(),
                "Fetched question submissions"
            );
            outcomes.push(self.process_question(&question, submissions, None).await?);
        }

        let records: usize = outcomes.iter().map(|o| o.records.len()).sum();
        info!(questions = outcomes.len(), records, "Contest processed");
        Ok(outcomes)
    }

    /// Create the question's detector run, cluster and persist
    #[instrument(skip(self, question, submissions), fields(question = %question.name, question_id = question.id))]
    pub async fn process_question(
        &self,
        question: &Question,
        submissions: Vec<Submission>,
        reference_submission_id: Option<SubmissionId>,
    ) -> Result<QuestionOutcome, DetectorError> {
        info!(submissions = submissions.len(), "Processing question");

        let detector_run = self
            .api
            .create_detector_run(DetectorRunRequest {
                detector: self.config.name.clone(),
                parameters: self.config.parameters(),
                question_id: question.id,
                reference_submission_id,
            })
            .await
            .map_err(DetectorError::Persistence)?;

        let outcome = self.cluster_question(question, submissions, detector_run.id).await;

        if !outcome.records.is_empty() {
            self.api
                .create_plagiarism_records(&outcome.records)
                .await
                .map_err(DetectorError::Persistence)?;
            metrics::record_persisted(outcome.records.len());
        }

        info!(
            detector_run_id = detector_run.id,
            records = outcome.records.len(),
            failed_languages = outcome.failures.len(),
            "Question processed"
        );

        Ok(QuestionOutcome {
            detector_run,
            records: outcome.records,
            failures: outcome.failures,
            skipped_languages: outcome.skipped_languages,
        })
    }

    /// Cluster every language group of a question without persisting.
    ///
    /// Language groups run concurrently; a failed oracle call only removes
    /// that group's records.
    pub async fn cluster_question(
        &self,
        question: &Question,
        submissions: Vec<Submission>,
        detector_run_id: DetectorRunId,
    ) -> ClusteringOutcome {
        let by_language = partition_by_language(submissions);

        let results: Vec<(String, UnitResult)> = stream::iter(by_language)
            .map(move |(language, group)| async move {
                let result = self.cluster_language(question, &language, group, detector_run_id).await;
                (language, result)
            })
            .buffered(self.config.max_concurrent_groups)
            .collect()
            .await;

        let mut outcome = ClusteringOutcome::default();
        for (language, result) in results {
            match result {
                UnitResult::Skipped => outcome.skipped_languages.push(language),
                UnitResult::Clustered(records) => outcome.records.extend(records),
                UnitResult::Failed(error) => outcome.failures.push(LanguageFailure { language, error }),
            }
        }
        outcome
    }

    async fn cluster_language(
        &self,
        question: &Question,
        language: &str,
        mut submissions: Vec<Submission>,
        detector_run_id: DetectorRunId,
    ) -> UnitResult {
        let threshold = self.config.group_size_threshold;
        if submissions.len() < threshold {
            info!(
                question = %question.name,
                language,
                submissions = submissions.len(),
                threshold,
                "Skipping language group below size threshold"
            );
            metrics::record_unit_skipped(language);
            return UnitResult::Skipped;
        }

        info!(
            question = %question.name,
            language,
            submissions = submissions.len(),
            "Processing language group"
        );
        let start = Instant::now();

        let inputs = oracle_inputs(&mut submissions);
        let oracle_start = Instant::now();
        let raw = match self.oracle.compare(language, &inputs).await {
            Ok(raw) => {
                metrics::record_oracle(oracle_start.elapsed().as_secs_f64(), true);
                raw
            }
            Err(e) => {
                metrics::record_oracle(oracle_start.elapsed().as_secs_f64(), false);
                metrics::record_unit_failure(language);
                error!(
                    question = %question.name,
                    language,
                    oracle = self.oracle.name(),
                    error = %e,
                    "Similarity oracle failed, language group contributes no records"
                );
                return UnitResult::Failed(e);
            }
        };

        let mut unit = ClusteringUnit::new(
            language,
            inputs.iter().map(|input| input.id),
            self.config.similarity_threshold,
        );
        let stats = unit.ingest_all(raw.into_iter().map(SimilarityJudgment::from));
        let groups = unit.groups().len();
        let records = unit.into_records(detector_run_id, threshold);

        info!(
            question = %question.name,
            language,
            qualified = stats.qualified,
            ignored = stats.ignored,
            groups,
            records = records.len(),
            "Language group clustered"
        );
        metrics::record_unit(start.elapsed().as_secs_f64(), language, groups, records.len());

        UnitResult::Clustered(records)
    }
}

/// Group submissions by language, languages in sorted order
pub fn partition_by_language(submissions: Vec<Submission>) -> BTreeMap<String, Vec<Submission>> {
    let mut groups: BTreeMap<String, Vec<Submission>> = BTreeMap::new();
    for submission in submissions {
        groups.entry(submission.language.clone()).or_default().push(submission);
    }
    groups
}

/// Oracle inputs for a language group: the earliest submission of each
/// author, in date order. Sorts `submissions` by date in place.
pub fn oracle_inputs(submissions: &mut [Submission]) -> Vec<OracleInput> {
    submissions.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));

    let mut authors = HashSet::new();
    submissions
        .iter()
        .filter(|s| authors.insert(s.author.as_str()))
        .map(|s| OracleInput {
            id: s.id,
            code: s.code.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{RawJudgment, StaticOracle};
    use chrono::{TimeZone, Utc};
    use cheatscan_common::api::InMemoryApi;
    use tokio_test::{assert_err, assert_ok};

    fn question(id: i64) -> Question {
        Question {
            id,
            name: format!("two-sum-{}", id),
            number: Some(1),
            number_in_contest: Some(1),
            contest_id: Some(1),
        }
    }

    fn submission(id: SubmissionId, language: &str, author: &str, date: i64) -> Submission {
        Submission {
            id,
            code: format!("solution {}", id),
            language: language.to_string(),
            date: Utc.timestamp_opt(date, 0).unwrap(),
            author: author.to_string(),
            question_id: 1,
        }
    }

    /// One submission per author, ids 1..=n
    fn language_group(language: &str, ids: impl IntoIterator<Item = SubmissionId>) -> Vec<Submission> {
        ids.into_iter()
            .map(|id| submission(id, language, &format!("user-{}", id), 1_700_000_000 + id))
            .collect()
    }

    fn orchestrator(api: Arc<InMemoryApi>, oracle: StaticOracle) -> ClusteringOrchestrator {
        ClusteringOrchestrator::new(api, Arc::new(oracle), DetectorConfig::default()).unwrap()
    }

    fn ring(ids: &[SubmissionId], sim: f64) -> Vec<RawJudgment> {
        ids.windows(2).map(|w| RawJudgment(sim, sim, w[0], w[1])).collect()
    }

    #[tokio::test]
    async fn test_no_judgments_creates_run_without_records() {
        let api = Arc::new(InMemoryApi::new());
        let orchestrator = orchestrator(api.clone(), StaticOracle::new());

        let outcome = assert_ok!(
            orchestrator
                .process_question(&question(1), language_group("python3", 1..=10), None)
                .await
        );
        assert!(outcome.records.is_empty());
        assert!(outcome.failures.is_empty());
        // Empty batches are not written
        assert!(api.record_batches().await.is_empty());
        assert_eq!(api.detector_runs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_disjoint_clusters_share_run() {
        let api = Arc::new(InMemoryApi::new());
        let mut judgments = ring(&[1, 2, 3, 4], 0.9);
        judgments.extend(ring(&[5, 6, 7, 8], 0.85));
        let oracle = StaticOracle::new().with_judgments("python3", judgments);
        let orchestrator = orchestrator(api.clone(), oracle);

        let outcome = orchestrator
            .process_question(&question(1), language_group("python3", 1..=9), None)
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        for record in &outcome.records {
            assert_eq!(record.detector_run_id, outcome.detector_run.id);
            assert_eq!(record.language, "python3");
        }
        let mut members: Vec<Vec<SubmissionId>> =
            outcome.records.iter().map(|r| r.submission_ids.clone()).collect();
        members.sort();
        assert_eq!(members, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]);

        let batches = api.record_batches().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test]
    async fn test_one_detector_run_across_languages() {
        let api = Arc::new(InMemoryApi::new());
        let oracle = StaticOracle::new()
            .with_judgments("python3", ring(&[1, 2, 3, 4], 0.9))
            .with_judgments("cpp", ring(&[11, 12, 13, 14], 0.95));
        let orchestrator = orchestrator(api.clone(), oracle);

        let mut submissions = language_group("python3", 1..=4);
        submissions.extend(language_group("cpp", 11..=14));
        let outcome = orchestrator
            .process_question(&question(1), submissions, Some(11))
            .await
            .unwrap();

        let runs = api.detector_runs().await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].reference_submission_id, Some(11));
        assert_eq!(runs[0].detector, "copydetect");
        assert_eq!(runs[0].parameters, DetectorConfig::default().parameters());

        assert_eq!(outcome.records.len(), 2);
        assert!(outcome.records.iter().all(|r| r.detector_run_id == runs[0].id));
        let languages: HashSet<&str> = outcome.records.iter().map(|r| r.language.as_str()).collect();
        assert_eq!(languages, HashSet::from(["python3", "cpp"]));
    }

    #[tokio::test]
    async fn test_small_language_group_is_skipped() {
        let api = Arc::new(InMemoryApi::new());
        let oracle = StaticOracle::new()
            .with_judgments("python3", ring(&[1, 2, 3, 4], 0.9))
            .failing_for("rust");
        let orchestrator = orchestrator(api.clone(), oracle);

        let mut submissions = language_group("python3", 1..=4);
        submissions.extend(language_group("rust", 20..=22));
        let outcome = orchestrator
            .process_question(&question(1), submissions, None)
            .await
            .unwrap();

        // The failing oracle is never consulted for the three rust submissions
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.skipped_languages, vec!["rust".to_string()]);
        assert_eq!(outcome.records.len(), 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_does_not_stop_siblings() {
        let api = Arc::new(InMemoryApi::new());
        let oracle = StaticOracle::new()
            .with_judgments("python3", ring(&[1, 2, 3, 4], 0.9))
            .failing_for("java");
        let orchestrator = orchestrator(api.clone(), oracle);

        let mut submissions = language_group("python3", 1..=4);
        submissions.extend(language_group("java", 30..=35));
        let outcome = orchestrator
            .process_question(&question(1), submissions, None)
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].language, "python3");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].language, "java");
    }

    #[tokio::test]
    async fn test_persistence_failure_is_surfaced() {
        let api = Arc::new(InMemoryApi::new());
        api.fail_writes(true);
        let oracle = StaticOracle::new().with_judgments("python3", ring(&[1, 2, 3, 4], 0.9));
        let orchestrator = orchestrator(api.clone(), oracle);

        let result = orchestrator
            .process_question(&question(1), language_group("python3", 1..=4), None)
            .await;
        let err = assert_err!(result);
        assert!(matches!(err, DetectorError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_later_submissions_of_same_author_are_not_compared() {
        let api = Arc::new(InMemoryApi::new());
        // 5 is a resubmission by the author of 1; judgments about it are ignored
        let mut judgments = ring(&[1, 2, 3], 0.9);
        judgments.push(RawJudgment(0.99, 0.99, 3, 5));
        let oracle = StaticOracle::new().with_judgments("python3", judgments);
        let orchestrator = orchestrator(api.clone(), oracle);

        let mut submissions = language_group("python3", 1..=4);
        submissions.push(submission(5, "python3", "user-1", 1_800_000_000));
        let outcome = orchestrator
            .process_question(&question(1), submissions, None)
            .await
            .unwrap();

        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_process_contest() {
        let api = Arc::new(InMemoryApi::new());
        api.add_contest("weekly-contest-1", vec![question(1), question(2)]).await;
        api.add_submissions(1, language_group("python3", 1..=4)).await;
        api.add_submissions(2, language_group("python3", 101..=103)).await;
        let oracle = StaticOracle::new().with_judgments("python3", ring(&[1, 2, 3, 4], 0.88));
        let orchestrator = orchestrator(api.clone(), oracle);

        let outcomes = orchestrator.process_contest("weekly-contest-1").await.unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].records.len(), 1);
        assert_eq!(outcomes[0].records[0].confidence_percentage, 88);
        assert!(outcomes[1].records.is_empty());
        assert_ne!(outcomes[0].detector_run.id, outcomes[1].detector_run.id);

        assert_err!(orchestrator.process_contest("unknown").await);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = DetectorConfig { group_size_threshold: 0, ..Default::default() };
        let result = ClusteringOrchestrator::new(
            Arc::new(InMemoryApi::new()),
            Arc::new(StaticOracle::new()),
            config,
        );
        assert!(matches!(result, Err(DetectorError::Config(_))));
    }

    #[test]
    fn test_oracle_inputs_keep_earliest_per_author() {
        let mut submissions = vec![
            submission(3, "python3", "bob", 300),
            submission(1, "python3", "alice", 200),
            submission(2, "python3", "alice", 100),
            submission(4, "python3", "carol", 50),
        ];
        let inputs = oracle_inputs(&mut submissions);
        let ids: Vec<SubmissionId> = inputs.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![4, 2, 3]);
        assert_eq!(submissions[0].id, 4);
    }

    #[test]
    fn test_partition_by_language() {
        let mut submissions = language_group("python3", 1..=2);
        submissions.extend(language_group("cpp", 3..=5));
        let groups = partition_by_language(submissions);
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["cpp", "python3"]);
        assert_eq!(groups["cpp"].len(), 3);
    }
}
