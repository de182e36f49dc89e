//! Prometheus metrics exposition
//!
//! - `login_requests_total` (counter): labels `route`, `status`
//! - `login_request_duration_seconds` (histogram): label `route`
//! - `login_upstream_errors_total` (counter): label `stage` (`exchange`, `userinfo`)

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "login_request_duration_seconds";

/// Buckets from 5ms to 30s: static pages at the bottom, Google round-trips at the top.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = builder()?.install_recorder()?;
    Ok(handle)
}

/// Recorder/handle pair that is not installed globally, so tests can run in parallel.
#[cfg(test)]
pub fn local_recorder() -> (
    metrics_exporter_prometheus::PrometheusRecorder,
    PrometheusHandle,
) {
    let recorder = match builder() {
        Ok(builder) => builder.build_recorder(),
        Err(_) => PrometheusBuilder::new().build_recorder(),
    };
    let handle = recorder.handle();
    (recorder, handle)
}

/// Record a completed request against its route template.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!("login_requests_total", "route" => route.to_string(), "status" => status.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string()).record(duration_secs);
}

/// Record a failed call to Google.
pub fn record_upstream_error(stage: &'static str) {
    metrics::counter!("login_upstream_errors_total", "stage" => stage).increment(1);
}

/// Route-layer middleware timing every matched request.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let started = Instant::now();

    let response = next.run(request).await;

    record_request(
        &route,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}
