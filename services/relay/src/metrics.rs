//! Prometheus metrics exposition
//!
//! Metrics carried by the relay:
//!
//! - `relay_requests_total` (counter): labels `route`, `status`
//! - `relay_request_duration_seconds` (histogram): label `route`
//! - `relay_tokens_issued_total` (counter): incremented on callback success
//! - `relay_token_refreshes_total` (counter): incremented per refresh cycle
//! - `relay_upstream_errors_total` (counter): label `status`
//! - `relay_users_registered_total` (counter)

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures `relay_request_duration_seconds` with explicit buckets so it
/// renders as a histogram (with `_bucket` lines for `histogram_quantile()`
/// queries) rather than the default summary. The range covers fast local
/// handling up to a full paginated fetch with a refresh round trip.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "relay_request_duration_seconds".to_string(),
            ),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed relay request with route and status labels.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "relay_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
    metrics::histogram!("relay_request_duration_seconds", "route" => route.to_string())
        .record(duration_secs);
}
