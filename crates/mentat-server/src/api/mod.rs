//! HTTP API Module
//!
//! Pull endpoints served alongside the poll loop.
//!
//! This module contains:
//! - `state`: Shared application state
//! - `health`: Liveness and readiness probes
//! - `metrics`: Prometheus exposition of the latency aggregate and self metrics

mod health;
mod metrics;
mod state;

pub use state::AppState;

use axum::{routing::get, Router};

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health checks
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Observability
        .route("/metrics", get(metrics::get_metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::MetricsAggregate;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState {
            aggregate: Arc::new(MetricsAggregate::new().unwrap()),
            metrics_state: None,
            readiness: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn get_body(state: AppState, uri: &str) -> (StatusCode, String) {
        let response = create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint_serves_histogram() {
        let state = state();
        state.aggregate.observe("local", "n1", 0.003);

        let (status, body) = get_body(state, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE node_latency histogram"));
        assert!(body.contains("destination_node=\"n1\""));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_before_any_observation() {
        let (status, body) = get_body(state(), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(!body.contains("node_latency_bucket"));
    }

    #[tokio::test]
    async fn test_readiness_follows_first_cycle() {
        let state = state();

        let (status, _) = get_body(state.clone(), "/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.store(true, Ordering::Release);
        let (status, body) = get_body(state, "/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "READY");
    }

    #[tokio::test]
    async fn test_liveness() {
        let (status, body) = get_body(state(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }
}
