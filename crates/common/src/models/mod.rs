//! Data model shared between the detector and the persistence API
//!
//! All types serialize with the API's camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Submission identifier assigned by the contest platform
pub type SubmissionId = i64;

/// Detector run identifier assigned by the persistence API
pub type DetectorRunId = i64;

/// A contest question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_in_contest: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest_id: Option<i64>,
}

/// A fetched submission. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: SubmissionId,
    pub code: String,
    pub language: String,
    /// Submission time, transferred as Unix seconds
    #[serde(with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,
    #[serde(rename = "userSlug")]
    pub author: String,
    pub question_id: i64,
}

/// Request body for creating a detector run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorRunRequest {
    pub detector: String,
    pub parameters: String,
    pub question_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_submission_id: Option<SubmissionId>,
}

/// Audit record of one detector execution against a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorRun {
    pub id: DetectorRunId,
    pub detector: String,
    pub parameters: String,
    pub question_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_submission_id: Option<SubmissionId>,
}

/// One emitted plagiarism group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlagiarismRecord {
    /// Members of the group; order carries no meaning
    pub submission_ids: Vec<SubmissionId>,
    pub confidence_percentage: u8,
    pub detector_run_id: DetectorRunId,
    pub language: String,
}
