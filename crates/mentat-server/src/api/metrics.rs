//! Prometheus Metrics Endpoint
//!
//! Exposes `node_latency` and the self metrics at GET /metrics

use super::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics - Prometheus metrics endpoint
///
/// Reads the aggregate without blocking the poll loop.
#[tracing::instrument(skip(state))]
pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let mut output = match state.aggregate.render() {
        Ok(output) => output,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode latency metrics");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", CONTENT_TYPE)],
                e.to_string(),
            );
        }
    };

    if let Some(metrics) = &state.metrics_state {
        output.push_str(&metrics.prometheus_handle.render());
    }

    (StatusCode::OK, [("content-type", CONTENT_TYPE)], output)
}
