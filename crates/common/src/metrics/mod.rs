//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Atlas metrics
pub const METRICS_PREFIX: &str = "atlas";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s (exports)
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Workflow metrics
    describe_counter!(
        format!("{}_abstracts_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Abstracts created, by initial status"
    );

    describe_counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Abstract status changes, by target status"
    );

    describe_counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        Unit::Count,
        "Reviewer decisions recorded, by insert/update"
    );

    describe_counter!(
        format!("{}_reviewer_assignments_total", METRICS_PREFIX),
        Unit::Count,
        "Reviewer/abstract pairs processed, by outcome"
    );

    describe_counter!(
        format!("{}_bulk_items_total", METRICS_PREFIX),
        Unit::Count,
        "Items processed by bulk status transitions, by outcome"
    );

    // Export metrics
    describe_counter!(
        format!("{}_exports_total", METRICS_PREFIX),
        Unit::Count,
        "Export artifacts produced, by mode and outcome"
    );

    describe_histogram!(
        format!("{}_export_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Export generation latency in seconds"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a newly created abstract
pub fn record_submission(status: &str) {
    counter!(
        format!("{}_abstracts_submitted_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a status change
pub fn record_transition(target: &str) {
    counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        "target" => target.to_string()
    )
    .increment(1);
}

/// Record a reviewer decision
pub fn record_review(updated: bool) {
    let kind = if updated { "update" } else { "insert" };

    counter!(
        format!("{}_reviews_submitted_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record assignment pair outcomes
pub fn record_assignments(succeeded: usize, failed: usize) {
    counter!(
        format!("{}_reviewer_assignments_total", METRICS_PREFIX),
        "outcome" => "success"
    )
    .increment(succeeded as u64);

    counter!(
        format!("{}_reviewer_assignments_total", METRICS_PREFIX),
        "outcome" => "failure"
    )
    .increment(failed as u64);
}

/// Record bulk transition outcomes
pub fn record_bulk(succeeded: usize, failed: usize) {
    counter!(
        format!("{}_bulk_items_total", METRICS_PREFIX),
        "outcome" => "success"
    )
    .increment(succeeded as u64);

    counter!(
        format!("{}_bulk_items_total", METRICS_PREFIX),
        "outcome" => "failure"
    )
    .increment(failed as u64);
}

/// Record an export attempt
pub fn record_export(duration_secs: f64, mode: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_exports_total", METRICS_PREFIX),
        "mode" => mode.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_export_duration_seconds", METRICS_PREFIX),
            "mode" => mode.to_string()
        )
        .record(duration_secs);
    }
}
