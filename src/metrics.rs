/// Metrics and telemetry for the keyring frontend
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - Enrollment outcomes
/// - Key resolution outcomes (including negative cache short-circuits)
/// - Key store operations
/// - Deletion notifications processed by the journal watchers

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_int_counter_vec, register_int_gauge, Encoder, Gauge, IntCounterVec,
    IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by route and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "keyring_http_requests_total",
        "Total number of HTTP requests",
        &["route", "status"]
    )
    .unwrap();

    // ========== Identity Metrics ==========

    /// Enrollment attempts by outcome
    pub static ref ENROLLMENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "keyring_enrollments_total",
        "Total number of CSR enrollment attempts",
        &["outcome"]
    )
    .unwrap();

    /// Key resolutions by outcome (hit, negative_cache, miss)
    pub static ref KEY_RESOLUTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "keyring_key_resolutions_total",
        "Total number of client key resolutions",
        &["outcome"]
    )
    .unwrap();

    /// Negative cache size (number of entries, as of the last sweep)
    pub static ref NEGATIVE_CACHE_SIZE: IntGauge = register_int_gauge!(
        "keyring_negative_cache_size",
        "Number of entries in the negative key cache"
    )
    .unwrap();

    // ========== Store Metrics ==========

    /// Key store operations by operation and status
    pub static ref STORE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "keyring_store_operations_total",
        "Total number of key store operations",
        &["operation", "status"]
    )
    .unwrap();

    // ========== Journal Metrics ==========

    /// Journal rows handled by queue and status
    pub static ref JOURNAL_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "keyring_journal_events_total",
        "Total number of journal rows handled by watchers",
        &["queue", "status"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "keyring_uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(route: &str, status: u16) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[route, &status.to_string()])
        .inc();
}

/// Record an enrollment outcome
pub fn record_enrollment(outcome: &str) {
    ENROLLMENTS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a key resolution outcome
pub fn record_key_resolution(outcome: &str) {
    KEY_RESOLUTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a key store operation
pub fn record_store_operation(operation: &str, success: bool) {
    STORE_OPERATIONS_TOTAL
        .with_label_values(&[operation, if success { "success" } else { "failure" }])
        .inc();
}

/// Record a journal row handled by a watcher
pub fn record_journal_event(queue: &str, success: bool) {
    JOURNAL_EVENTS_TOTAL
        .with_label_values(&[queue, if success { "success" } else { "failure" }])
        .inc();
}
