// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics for the gateway, rendered at GET /metrics.
//
// METRIC TYPES USED:
// - Counter: Only goes up (requests, failures). Resets on restart.
// - Histogram: Distribution of values in buckets (latency, record counts).
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// METRIC NAMES (Constants)
// =============================================================================

/// HTTP request counter
/// Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// HTTP request duration histogram
/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Upstream SOAP calls
/// Labels: outcome (HTTP status code, "timeout" or "transport_error")
pub const UPSTREAM_CALLS_TOTAL: &str = "upstream_calls_total";

/// Upstream SOAP call latency
pub const UPSTREAM_CALL_DURATION_SECONDS: &str = "upstream_call_duration_seconds";

/// Failed lookups
/// Labels: kind (validation, transport, upstream_rejection, unwrap)
pub const TRANSLATION_FAILURES_TOTAL: &str = "translation_failures_total";

/// Stock records returned per successful lookup
pub const STOCK_RECORDS_RETURNED: &str = "stock_records_returned";

// =============================================================================
// SETUP FUNCTION
// =============================================================================
/// Initialize the Prometheus recorder and return the handle used by
/// GET /metrics.
pub fn setup_metrics() -> Result<PrometheusHandle> {
    // ERP calls are slow; the upper buckets go past the default timeout
    let latency_buckets = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
    ];

    let record_buckets = &[0.0, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(UPSTREAM_CALL_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(STOCK_RECORDS_RETURNED.to_string()),
            record_buckets,
        )?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_counter!(UPSTREAM_CALLS_TOTAL, "SOAP calls made to the ERP, by outcome");
    describe_histogram!(UPSTREAM_CALL_DURATION_SECONDS, "ERP SOAP call latency in seconds");
    describe_counter!(TRANSLATION_FAILURES_TOTAL, "Failed stock lookups, by failure kind");
    describe_histogram!(STOCK_RECORDS_RETURNED, "Stock records returned per successful lookup");

    Ok(handle)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Record an inbound HTTP request
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

/// Record one upstream SOAP exchange
pub fn record_upstream_call(outcome: &str, duration_secs: f64) {
    counter!(UPSTREAM_CALLS_TOTAL, "outcome" => outcome.to_string()).increment(1);
    histogram!(UPSTREAM_CALL_DURATION_SECONDS).record(duration_secs);
}

pub fn record_translation_failure(kind: &'static str) {
    counter!(TRANSLATION_FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_records_returned(count: usize) {
    histogram!(STOCK_RECORDS_RETURNED).record(count as f64);
}
