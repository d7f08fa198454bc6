/// Metrics for Tessera
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Card verifications and event registrations
/// - Login, password reset and CSRF outcomes
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    // ========== Membership Metrics ==========

    /// Card verifications by resulting status
    pub static ref CARD_VERIFICATIONS: IntCounterVec = register_int_counter_vec!(
        "card_verifications_total",
        "Total number of membership card verifications",
        &["status"]
    )
    .unwrap();

    /// Event registration attempts by outcome
    pub static ref EVENT_REGISTRATIONS: IntCounterVec = register_int_counter_vec!(
        "event_registrations_total",
        "Total number of event registration attempts",
        &["outcome"]
    )
    .unwrap();

    /// CSV and report downloads
    pub static ref EXPORTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "exports_total",
        "Total number of data exports",
        &["format"]
    )
    .unwrap();

    // ========== Account Metrics ==========

    /// Login attempts by result
    pub static ref LOGIN_ATTEMPTS: IntCounterVec = register_int_counter_vec!(
        "login_attempts_total",
        "Total number of login attempts",
        &["result"]
    )
    .unwrap();

    /// Password reset requests and redemptions
    pub static ref PASSWORD_RESETS: IntCounterVec = register_int_counter_vec!(
        "password_resets_total",
        "Total number of password reset operations",
        &["stage", "result"]
    )
    .unwrap();

    /// Rejected state-changing requests
    pub static ref CSRF_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "csrf_rejections_total",
        "Total number of requests rejected for a missing or invalid CSRF token",
        &["path"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]
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
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record an event registration attempt
pub fn record_registration(outcome: &str) {
    EVENT_REGISTRATIONS.with_label_values(&[outcome]).inc();
}

/// Record a login attempt
pub fn record_login(success: bool) {
    LOGIN_ATTEMPTS
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}

/// Record a password reset request (`stage = "request"`) or redemption
/// (`stage = "redeem"`)
pub fn record_password_reset(stage: &str, success: bool) {
    PASSWORD_RESETS
        .with_label_values(&[stage, if success { "success" } else { "failure" }])
        .inc();
}

/// Record a CSRF rejection
pub fn record_csrf_rejection(path: &str) {
    CSRF_REJECTIONS.with_label_values(&[path]).inc();
}

/// Record an export download
pub fn record_export(format: &str) {
    EXPORTS_TOTAL.with_label_values(&[format]).inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}
