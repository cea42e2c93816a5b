//! Group filter and record builder
//!
//! A `ClusteringUnit` is the scratch state of one (question, language)
//! computation: a fresh partition and confidence tracker over the unit's
//! submissions. Judgments are folded in one by one, then every component
//! large enough is projected into a `PlagiarismRecord`.

use crate::confidence::{to_percentage, ConfidenceTracker};
use crate::oracle::SimilarityJudgment;
use crate::partition::Partition;
use cheatscan_common::models::DetectorRunId;
use cheatscan_common::{PlagiarismRecord, SubmissionId};
use tracing::debug;

/// What happened to one judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeVerdict {
    /// Both directions exceeded the threshold; the pair was merged
    Qualified,
    /// Valid judgment below the threshold
    BelowThreshold,
    /// Malformed or outside the unit
    Ignored,
}

/// Counts of judgment verdicts for one unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub qualified: usize,
    pub below_threshold: usize,
    pub ignored: usize,
}

/// Transient cluster before projection into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlagiarismGroup {
    /// Members sorted ascending
    pub members: Vec<SubmissionId>,
    /// Minimum of the members' best similarity, as a percentage
    pub confidence: u8,
}

/// Scratch clustering state for one (question, language) unit
#[derive(Debug)]
pub struct ClusteringUnit {
    language: String,
    similarity_threshold: f64,
    partition: Partition,
    tracker: ConfidenceTracker,
    stats: IngestStats,
}

impl ClusteringUnit {
    /// Start a unit over the given submissions
    pub fn new(
        language: impl Into<String>,
        submission_ids: impl IntoIterator<Item = SubmissionId>,
        similarity_threshold: f64,
    ) -> Self {
        Self {
            language: language.into(),
            similarity_threshold,
            partition: Partition::new(submission_ids),
            tracker: ConfidenceTracker::new(),
            stats: IngestStats::default(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    /// Fold one judgment into the partition and tracker
    pub fn ingest(&mut self, judgment: SimilarityJudgment) -> EdgeVerdict {
        let verdict = self.classify(&judgment);
        match verdict {
            EdgeVerdict::Qualified => {
                self.tracker.observe_edge(
                    judgment.sub_a,
                    judgment.sub_b,
                    judgment.sim_a,
                    judgment.sim_b,
                );
                self.partition.union(judgment.sub_a, judgment.sub_b);
                self.stats.qualified += 1;
            }
            EdgeVerdict::BelowThreshold => self.stats.below_threshold += 1,
            EdgeVerdict::Ignored => {
                debug!(
                    language = %self.language,
                    sub_a = judgment.sub_a,
                    sub_b = judgment.sub_b,
                    sim_a = judgment.sim_a,
                    sim_b = judgment.sim_b,
                    "Ignoring malformed judgment"
                );
                self.stats.ignored += 1;
            }
        }
        verdict
    }

    /// Fold every judgment
    pub fn ingest_all(&mut self, judgments: impl IntoIterator<Item = SimilarityJudgment>) -> IngestStats {
        for judgment in judgments {
            self.ingest(judgment);
        }
        self.stats
    }

    fn classify(&self, judgment: &SimilarityJudgment) -> EdgeVerdict {
        if !judgment.is_well_formed()
            || !self.partition.contains(judgment.sub_a)
            || !self.partition.contains(judgment.sub_b)
        {
            return EdgeVerdict::Ignored;
        }
        if judgment.qualifies(self.similarity_threshold) {
            EdgeVerdict::Qualified
        } else {
            EdgeVerdict::BelowThreshold
        }
    }

    /// Every component with its confidence, singletons included
    pub fn groups(&mut self) -> Vec<PlagiarismGroup> {
        let tracker = &self.tracker;
        self.partition
            .groups()
            .into_iter()
            .map(|members| {
                let confidence = to_percentage(tracker.min_over(&members));
                PlagiarismGroup { members, confidence }
            })
            .collect()
    }

    /// Project the surviving components into records
    pub fn into_records(mut self, detector_run_id: DetectorRunId, group_size_threshold: usize) -> Vec<PlagiarismRecord> {
        build_records(
            &mut self.partition,
            &self.tracker,
            &self.language,
            detector_run_id,
            group_size_threshold,
        )
    }
}

/// Turn a finished partition into records, dropping every component
/// smaller than `group_size_threshold`.
pub fn build_records(
    partition: &mut Partition,
    tracker: &ConfidenceTracker,
    language: &str,
    detector_run_id: DetectorRunId,
    group_size_threshold: usize,
) -> Vec<PlagiarismRecord> {
    let groups = partition.groups();
    let found = groups.len();

    let records: Vec<PlagiarismRecord> = groups
        .into_iter()
        .filter(|members| members.len() >= group_size_threshold)
        .map(|members| {
            if members.len() > 1 {
                // Every member of a merged component has a qualifying edge
                assert!(
                    members.iter().all(|&id| tracker.has_observed(id)),
                    "component {:?} has a member without observed similarity",
                    members
                );
            }
            let confidence_percentage = to_percentage(tracker.min_over(&members));
            PlagiarismRecord {
                submission_ids: members,
                confidence_percentage,
                detector_run_id,
                language: language.to_string(),
            }
        })
        .collect();

    debug!(
        language,
        components = found,
        records = records.len(),
        group_size_threshold,
        "Built plagiarism records"
    );
    records
}
