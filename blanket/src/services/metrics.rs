//! Prometheus metrics for the form service.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

/// HTTP request counter by method, route and status.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blanket_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .expect("Failed to register http_requests_total")
});

/// HTTP request duration histogram by method and route.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "blanket_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register http_request_duration")
});

/// Duty calculations by outcome.
pub static CALCULATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blanket_calculations_total",
        "Total number of duty calculations by outcome",
        &["outcome"] // ok, invalid, no_table
    )
    .expect("Failed to register calculations_total")
});

/// Counterparty lookups by role and outcome.
pub static LOOKUP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "blanket_lookup_requests_total",
        "Total number of counterparty lookups",
        &["role", "outcome"]
    )
    .expect("Failed to register lookup_requests_total")
});

/// Render every registered metric in the Prometheus text format.
pub fn gather_metrics() -> anyhow::Result<String> {
    Lazy::force(&HTTP_REQUESTS_TOTAL);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&CALCULATIONS_TOTAL);
    Lazy::force(&LOOKUP_REQUESTS_TOTAL);

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
