//! Confidence tracker
//!
//! Best observed similarity per submission across the qualifying edges
//! touching it.

use cheatscan_common::SubmissionId;
use std::collections::HashMap;

/// Running per-submission maximum of observed similarity.
/// Unseen submissions read as 0.
#[derive(Debug, Clone, Default)]
pub struct ConfidenceTracker {
    best: HashMap<SubmissionId, f64>,
}

impl ConfidenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one observed score into the submission's maximum
    pub fn observe(&mut self, id: SubmissionId, similarity: f64) {
        let entry = self.best.entry(id).or_insert(0.0);
        if similarity > *entry {
            *entry = similarity;
        }
    }

    /// Fold both directions of a qualifying edge
    pub fn observe_edge(&mut self, a: SubmissionId, b: SubmissionId, sim_a: f64, sim_b: f64) {
        self.observe(a, sim_a);
        self.observe(b, sim_b);
    }

    /// Best observed similarity, 0 when never observed
    pub fn get(&self, id: SubmissionId) -> f64 {
        self.best.get(&id).copied().unwrap_or(0.0)
    }

    /// Whether any score was observed for the submission
    pub fn has_observed(&self, id: SubmissionId) -> bool {
        self.best.contains_key(&id)
    }

    /// Worst case across members: the minimum of their maxima.
    /// An empty member list yields 0.
    pub fn min_over(&self, members: &[SubmissionId]) -> f64 {
        members
            .iter()
            .map(|&id| self.get(id))
            .reduce(f64::min)
            .unwrap_or(0.0)
    }
}

/// Integer percentage of a similarity in [0, 1], truncated
pub fn to_percentage(similarity: f64) -> u8 {
    (similarity * 100.0).floor().clamp(0.0, 100.0) as u8
}
