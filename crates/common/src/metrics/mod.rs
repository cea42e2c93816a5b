//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for the clustering pipeline
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all CheatScan metrics
pub const METRICS_PREFIX: &str = "cheatscan";

/// Buckets for oracle latency (comparisons of a whole language group)
pub const ORACLE_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.500,  // 500ms
    1.000,  // 1s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
    300.0,  // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_units_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Language groups clustered, by status"
    );

    describe_counter!(
        format!("{}_units_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Language groups below the size threshold"
    );

    describe_histogram!(
        format!("{}_unit_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language group processing latency in seconds"
    );

    describe_counter!(
        format!("{}_groups_found_total", METRICS_PREFIX),
        Unit::Count,
        "Connected components found, before size filtering"
    );

    describe_counter!(
        format!("{}_records_emitted_total", METRICS_PREFIX),
        Unit::Count,
        "Plagiarism records emitted"
    );

    describe_counter!(
        format!("{}_oracle_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Similarity oracle requests, by status"
    );

    describe_histogram!(
        format!("{}_oracle_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Similarity oracle latency in seconds"
    );

    describe_counter!(
        format!("{}_records_persisted_total", METRICS_PREFIX),
        Unit::Count,
        "Plagiarism records written to the persistence API"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record a clustered language group
pub fn record_unit(duration_secs: f64, language: &str, groups: usize, records: usize) {
    counter!(
        format!("{}_units_processed_total", METRICS_PREFIX),
        "language" => language.to_string(),
        "status" => "success"
    )
    .increment(1);

    histogram!(
        format!("{}_unit_duration_seconds", METRICS_PREFIX),
        "language" => language.to_string()
    )
    .record(duration_secs);

    counter!(format!("{}_groups_found_total", METRICS_PREFIX)).increment(groups as u64);
    counter!(
        format!("{}_records_emitted_total", METRICS_PREFIX),
        "language" => language.to_string()
    )
    .increment(records as u64);
}

/// Helper to record a language group whose oracle call failed
pub fn record_unit_failure(language: &str) {
    counter!(
        format!("{}_units_processed_total", METRICS_PREFIX),
        "language" => language.to_string(),
        "status" => "error"
    )
    .increment(1);
}

/// Helper to record a skipped language group
pub fn record_unit_skipped(language: &str) {
    counter!(
        format!("{}_units_skipped_total", METRICS_PREFIX),
        "language" => language.to_string()
    )
    .increment(1);
}

/// Helper to record oracle metrics
pub fn record_oracle(duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_oracle_requests_total", METRICS_PREFIX),
        "status" => status
    )
    .increment(1);

    if success {
        histogram!(format!("{}_oracle_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    }
}

/// Helper to record persisted records
pub fn record_persisted(count: usize) {
    counter!(format!("{}_records_persisted_total", METRICS_PREFIX)).increment(count as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in ORACLE_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_helpers_without_recorder() {
        // No recorder installed: every helper must be a no-op
        record_unit(0.5, "python3", 3, 1);
        record_unit_failure("cpp");
        record_unit_skipped("java");
        record_oracle(0.2, true);
        record_persisted(4);
    }
}
