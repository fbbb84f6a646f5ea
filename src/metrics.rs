/// Metrics and telemetry for Client Pulse
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Signup and verification outcomes
/// - Feedback volume
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, route, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pulse_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "pulse_http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    // ========== Registration Metrics ==========

    /// Signup requests that staged a pending registration
    pub static ref SIGNUPS_REQUESTED_TOTAL: IntCounter = register_int_counter!(
        "pulse_signups_requested_total",
        "Total number of signup requests that issued a verification code"
    )
    .unwrap();

    /// Pending registrations promoted to users
    pub static ref ACCOUNTS_VERIFIED_TOTAL: IntCounter = register_int_counter!(
        "pulse_accounts_verified_total",
        "Total number of accounts created through verification"
    )
    .unwrap();

    /// Rejected verification attempts by reason
    pub static ref OTP_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pulse_otp_failures_total",
        "Total number of failed verification attempts",
        &["reason"]
    )
    .unwrap();

    // ========== Feedback Metrics ==========

    /// Feedback created by category
    pub static ref FEEDBACK_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pulse_feedback_created_total",
        "Total number of feedback entries created",
        &["category"]
    )
    .unwrap();

    /// Feedback deleted
    pub static ref FEEDBACK_DELETED_TOTAL: IntCounter = register_int_counter!(
        "pulse_feedback_deleted_total",
        "Total number of feedback entries deleted"
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pulse_background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "pulse_background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0]
    )
    .unwrap();

    // ========== Error Metrics ==========

    /// Server-side errors by error code
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pulse_errors_total",
        "Total number of server errors",
        &["error_type"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, route: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, route, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, route])
        .observe(duration);
}

/// Record a staged signup
pub fn record_signup_requested() {
    SIGNUPS_REQUESTED_TOTAL.inc();
}

/// Record a successful verification
pub fn record_account_verified() {
    ACCOUNTS_VERIFIED_TOTAL.inc();
}

/// Record a rejected verification
pub fn record_otp_failure(reason: &str) {
    OTP_FAILURES_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a feedback creation
pub fn record_feedback_created(category: &str) {
    FEEDBACK_CREATED_TOTAL.with_label_values(&[category]).inc();
}

/// Record a feedback deletion
pub fn record_feedback_deleted() {
    FEEDBACK_DELETED_TOTAL.inc();
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

/// Record a server error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
