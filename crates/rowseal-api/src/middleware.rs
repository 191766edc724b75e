//! # Request Metrics
//!
//! Counts requests by status class and records latency through the
//! `metrics` facade. Exported at `/metrics` when a Prometheus recorder
//! is installed.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Middleware recording `rowseal_http_requests_total{status}` and
/// `rowseal_http_request_duration_seconds`.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let response = next.run(request).await;

    let status = response.status();
    let class = if status.is_server_error() {
        "5xx"
    } else if status.is_client_error() {
        "4xx"
    } else {
        "2xx"
    };
    metrics::counter!("rowseal_http_requests_total", "status" => class).increment(1);
    metrics::histogram!("rowseal_http_request_duration_seconds").record(started.elapsed().as_secs_f64());
    response
}
