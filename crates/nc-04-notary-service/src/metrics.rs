//! # Notary Metrics
//!
//! Prometheus metrics for the notary service, enabled with the `metrics`
//! feature. Without it every recorder is a no-op.
//!
//! - `notary_notarisations_committed_total`: requests signed
//! - `notary_notarisations_rejected_total{reason}`: requests refused, by
//!   `NotaryError` kind
//! - `notary_flow_latency_seconds`: time from request receipt to response

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref NOTARISATIONS_COMMITTED: IntCounter = register_int_counter!(
        "notary_notarisations_committed_total",
        "Total number of notarisation requests signed"
    )
    .expect("Failed to create NOTARISATIONS_COMMITTED metric");

    pub static ref NOTARISATIONS_REJECTED: IntCounterVec = register_int_counter_vec!(
        "notary_notarisations_rejected_total",
        "Total number of notarisation requests refused",
        &["reason"]
    )
    .expect("Failed to create NOTARISATIONS_REJECTED metric");

    pub static ref FLOW_LATENCY: Histogram = register_histogram!(
        "notary_flow_latency_seconds",
        "Time from request receipt to response in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to create FLOW_LATENCY metric");
}

#[cfg(feature = "metrics")]
pub fn record_committed() {
    NOTARISATIONS_COMMITTED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_rejected(reason: &str) {
    NOTARISATIONS_REJECTED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_flow_latency(seconds: f64) {
    FLOW_LATENCY.observe(seconds);
}

#[cfg(not(feature = "metrics"))]
pub fn record_committed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_rejected(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_flow_latency(_seconds: f64) {}
