//! Backend request metrics.
//!
//! - Request counters by endpoint and status
//! - Latency histograms

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total backend requests by endpoint and status.
    pub const REQUESTS_TOTAL: &str = "vcount_backend_requests_total";

    /// Request latency in seconds by endpoint.
    pub const LATENCY_SECONDS: &str = "vcount_backend_latency_seconds";
}

/// Record metrics for a completed request. Status 0 means no response.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.contains("requests"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
    }
}
