//! Prometheus metrics
//!
//! Registered once at first touch; `/metrics` renders the default registry
//! in text exposition format.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec, TextEncoder,
};

/// Orders entering the dispatch flow
pub static ORDERS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("routematch_orders_total", "Orders submitted for dispatch").unwrap()
});

/// Courier decisions on outstanding offers, labelled accepted/rejected
pub static DRIVER_RESPONSE: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "routematch_driver_response",
        "Courier decisions on offers",
        &["status"]
    )
    .unwrap()
});

/// Acceptance probabilities produced per ranked candidate
pub static SCORE_DISTRIBUTION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "routematch_score_distribution",
        "Predicted acceptance probabilities",
        vec![0.1, 0.3, 0.5, 0.7, 0.9]
    )
    .unwrap()
});

/// End-to-end `POST /orders` latency, seconds
pub static MATCH_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "routematch_match_latency_seconds",
        "Dispatch flow wall-clock time",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap()
});

/// Render the default registry as text exposition format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    encoder
        .encode_to_string(&prometheus::gather())
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to encode metrics");
            String::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_metrics_render() {
        ORDERS_TOTAL.inc();
        DRIVER_RESPONSE.with_label_values(&["accepted"]).inc();
        SCORE_DISTRIBUTION.observe(0.42);

        let text = render();
        assert!(text.contains("routematch_orders_total"));
        assert!(text.contains("routematch_driver_response"));
        assert!(text.contains("routematch_score_distribution"));
    }
}
