//! CheatScan Detector
//!
//! Turns pairwise similarity judgments for a question's submissions into
//! plagiarism group records:
//! 1. Partition submissions by language
//! 2. Ask the similarity oracle for pairwise judgments per language
//! 3. Union submissions joined by a qualifying edge
//! 4. Emit every large enough cluster with its worst-case confidence

pub mod confidence;
pub mod errors;
pub mod grouping;
pub mod oracle;
pub mod partition;
pub mod processor;

pub use errors::DetectorError;
pub use grouping::{build_records, ClusteringUnit};
pub use oracle::{create_oracle, SimilarityOracle};
pub use processor::{ClusteringOrchestrator, QuestionOutcome};
