//! Metrics instrumentation for ranger-dns.
//!
//! All metrics are prefixed with `ranger_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS query handled by the ranger stage.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Answered => "answered",
        QueryResult::Forwarded => "forwarded",
        QueryResult::NoMatch => "no_match",
        QueryResult::NotReady => "not_ready",
        QueryResult::PassThrough => "pass_through",
    };

    counter!("ranger_dns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("ranger_dns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    /// Synthesized records were written directly.
    Answered,
    /// Synthesized records were handed to the next handler for merging.
    Forwarded,
    /// Name not in the registry; forwarded untouched.
    NoMatch,
    /// Cache never populated.
    NotReady,
    /// Query without a question section.
    PassThrough,
}

/// Record a registry sync attempt.
pub fn record_sync_attempt() {
    counter!("ranger_dns.sync.count").increment(1);
}

/// Record a failed registry sync.
pub fn record_sync_failure() {
    counter!("ranger_dns.sync.failure.count").increment(1);
}

/// Record one HTTP request to the registry.
///
/// `code` is the HTTP status, or `"err"` when no response was received.
pub fn record_api_request(code: &str, method: &'static str, host: &str) {
    counter!(
        "ranger_dns.api.request.count",
        "code" => code.to_string(),
        "method" => method,
        "host" => host.to_string()
    )
    .increment(1);
}

/// Record state counts (call periodically or on change).
pub fn record_state_counts(services: usize, nodes: usize) {
    gauge!("ranger_dns.state.services.count").set(services as f64);
    gauge!("ranger_dns.state.nodes.count").set(nodes as f64);
}

/// Record readiness state.
pub fn record_ready_state(ready: bool) {
    gauge!("ranger_dns.state.ready").set(if ready { 1.0 } else { 0.0 });
}

/// Record SRV records synthesized for a matched query.
pub fn record_srv_records_returned(count: usize) {
    histogram!("ranger_dns.query.srv.records_returned").record(count as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
