//! Prometheus metrics for billing operations and HTTP traffic.

use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "billflow_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// HTTP request counter
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// HTTP request duration histogram
pub static HTTP_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Invoices generated counter (per-tenant metering)
pub static INVOICES_GENERATED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Payments recorded counter (per-tenant metering)
pub static PAYMENTS_RECORDED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Usage records counter (per-tenant metering)
pub static USAGE_RECORDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// API key verification outcomes
pub static API_KEY_AUTH_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billflow_http_requests_total",
                "Total HTTP requests by method, path and status"
            ),
            &["method", "path", "status"]
        )
        .expect("Failed to register HTTP_REQUESTS_TOTAL")
    });

    HTTP_REQUEST_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "billflow_http_request_duration_seconds",
                "HTTP request duration",
                vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
            ),
            &["method", "path"]
        )
        .expect("Failed to register HTTP_REQUEST_DURATION")
    });

    INVOICES_GENERATED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billflow_invoices_generated_total",
                "Total invoices generated by tenant"
            ),
            &["company_id"]
        )
        .expect("Failed to register INVOICES_GENERATED_TOTAL")
    });

    PAYMENTS_RECORDED_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billflow_payments_recorded_total",
                "Total payments recorded by tenant"
            ),
            &["company_id"]
        )
        .expect("Failed to register PAYMENTS_RECORDED_TOTAL")
    });

    USAGE_RECORDS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billflow_usage_records_total",
                "Total usage records by tenant and ingestion source"
            ),
            &["company_id", "source"]
        )
        .expect("Failed to register USAGE_RECORDS_TOTAL")
    });

    API_KEY_AUTH_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "billflow_api_key_auth_total",
                "API key verification attempts by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register API_KEY_AUTH_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: &str) {
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, status]).inc();
    }
}

/// Record HTTP request duration.
pub fn record_http_request_duration(method: &str, path: &str, duration_secs: f64) {
    if let Some(histogram) = HTTP_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }
}

/// Record a generated invoice.
pub fn record_invoice_generated(company_id: &str) {
    if let Some(counter) = INVOICES_GENERATED_TOTAL.get() {
        counter.with_label_values(&[company_id]).inc();
    }
}

/// Record a payment.
pub fn record_payment_recorded(company_id: &str) {
    if let Some(counter) = PAYMENTS_RECORDED_TOTAL.get() {
        counter.with_label_values(&[company_id]).inc();
    }
}

/// Record an ingested usage record.
pub fn record_usage_ingested(company_id: &str, source: &str) {
    if let Some(counter) = USAGE_RECORDS_TOTAL.get() {
        counter.with_label_values(&[company_id, source]).inc();
    }
}

/// Record an API key verification outcome.
pub fn record_api_key_auth(outcome: &str) {
    if let Some(counter) = API_KEY_AUTH_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}
