use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};
use std::time::Instant;

use crate::{AdapterError, Result};

lazy_static! {
    pub static ref ADAPTER_UP: IntGauge = register_int_gauge!(
        "signoz_adapter_up",
        "Whether the adapter is serving (1) or not (0)"
    ).unwrap();

    pub static ref ALLOWED_METRICS: IntGauge = register_int_gauge!(
        "signoz_adapter_allowed_metrics",
        "Number of metric names the adapter is configured to expose"
    ).unwrap();

    // Request metrics
    pub static ref REQUEST_COUNTER: IntCounter = register_int_counter!(
        "signoz_adapter_requests_total",
        "Total number of metric API requests received"
    ).unwrap();

    pub static ref REQUEST_DURATION: Histogram = register_histogram!(
        "signoz_adapter_request_duration_seconds",
        "Metric API request duration in seconds",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]
    ).unwrap();

    // Backend metrics
    pub static ref BACKEND_QUERIES: IntCounterVec = register_int_counter_vec!(
        "signoz_adapter_backend_queries_total",
        "Queries issued to the SigNoz backend by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref BACKEND_QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "signoz_adapter_backend_query_duration_seconds",
        "Round trip time for SigNoz query_range calls",
        &["api"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]
    ).unwrap();

    // Aggregation metrics
    pub static ref DROPPED_SAMPLES: IntCounter = register_int_counter!(
        "signoz_adapter_dropped_samples_total",
        "Series dropped because their latest value was missing or not a finite number"
    ).unwrap();

    pub static ref FALLBACK_AGGREGATIONS: IntCounter = register_int_counter!(
        "signoz_adapter_fallback_aggregations_total",
        "Per-object lookups answered by summing every series"
    ).unwrap();
}

pub fn init_metrics(allowed_metrics: usize) {
    ADAPTER_UP.set(1);
    ALLOWED_METRICS.set(allowed_metrics as i64);
}

pub struct RequestTimer {
    start: Instant,
}

impl RequestTimer {
    pub fn new() -> Self {
        REQUEST_COUNTER.inc();
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for RequestTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        REQUEST_DURATION.observe(duration);
    }
}

pub fn record_backend_query(outcome: &str) {
    BACKEND_QUERIES.with_label_values(&[outcome]).inc();
}

pub fn record_backend_latency(api: &str, duration: f64) {
    BACKEND_QUERY_DURATION
        .with_label_values(&[api])
        .observe(duration);
}

pub fn record_dropped_sample() {
    DROPPED_SAMPLES.inc();
}

pub fn record_fallback_aggregation() {
    FALLBACK_AGGREGATIONS.inc();
}

/// Renders every registered metric in the Prometheus text format.
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| AdapterError::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| AdapterError::Internal(format!("Metrics output is not UTF-8: {}", e)))
}
