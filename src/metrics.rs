//! Prometheus metrics instrumentation.
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners.
//! The recorder is installed in `server::start`; in tests these calls hit
//! the no-op recorder.

use metrics::{counter, histogram};
use std::time::Instant;

/// Count a handled request by endpoint and response status
pub fn record_request(endpoint: &'static str, status: u16) {
    counter!(
        "fetchr_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record request latency for an endpoint
pub fn record_duration(endpoint: &'static str, start: Instant) {
    histogram!("fetchr_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Count a cache hit (download request served without fetch work)
pub fn record_cache_hit() {
    counter!("fetchr_cache_hits_total").increment(1);
}

/// Count a cache miss
pub fn record_cache_miss() {
    counter!("fetchr_cache_misses_total").increment(1);
}

/// Count a failed forwarding attempt against a single backend
pub fn record_backend_failure() {
    counter!("fetchr_backend_failures_total").increment(1);
}

/// Count files removed by the eviction sweep
pub fn record_evictions(count: u64) {
    counter!("fetchr_evicted_files_total").increment(count);
}
