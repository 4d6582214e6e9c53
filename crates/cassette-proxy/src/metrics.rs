//! Prometheus metrics for the cassette proxy.
//!
//! Tracks how requests are served (stub, forwarded, error), captures,
//! promotions and forwarding latency.
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use tracing::warn;

lazy_static! {
    /// Requests handled by a proxy listener
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "cassette_requests_total",
        "Total number of requests handled by the proxy listeners",
        &["listener", "outcome"]  // outcome: stub|forwarded|error
    )
    .unwrap();

    /// Calls written to the call store
    pub static ref CALLS_CAPTURED_TOTAL: CounterVec = register_counter_vec!(
        "cassette_calls_captured_total",
        "Total number of calls captured",
        &["listener"]
    )
    .unwrap();

    /// Call -> mapping promotions
    pub static ref PROMOTIONS_TOTAL: CounterVec = register_counter_vec!(
        "cassette_promotions_total",
        "Total number of call promotions",
        &["result"]  // result: ok|not_found|decode_error|conflict
    )
    .unwrap();

    /// Time spent waiting on the origin or upstream proxy
    pub static ref FORWARD_DURATION_MS: HistogramVec = register_histogram_vec!(
        "cassette_forward_duration_ms",
        "Duration of live forwards in milliseconds",
        &["listener", "status"],
        vec![1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 30000.0]
    )
    .unwrap();

    /// Entries per store
    pub static ref STORE_ENTRIES: GaugeVec = register_gauge_vec!(
        "cassette_store_entries",
        "Number of entries held in each store",
        &["store"]  // store: calls|mappings
    )
    .unwrap();
}

/// Collect and return all metrics in Prometheus text format
pub fn collect_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_request(listener: &str, outcome: &str) {
    REQUESTS_TOTAL.with_label_values(&[listener, outcome]).inc();
}

pub fn record_capture(listener: &str) {
    CALLS_CAPTURED_TOTAL.with_label_values(&[listener]).inc();
}

pub fn record_promotion(result: &str) {
    PROMOTIONS_TOTAL.with_label_values(&[result]).inc();
}

pub fn record_forward_duration(listener: &str, status: u16, duration_ms: f64) {
    FORWARD_DURATION_MS
        .with_label_values(&[listener, &status.to_string()])
        .observe(duration_ms);
}

pub fn set_store_entries(store: &str, count: usize) {
    STORE_ENTRIES.with_label_values(&[store]).set(count as f64);
}
