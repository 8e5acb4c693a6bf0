//! Health Check Endpoints
//!
//! Liveness and readiness probe handlers for Kubernetes.

use super::state::AppState;
use axum::{extract::State, http::StatusCode};
use std::sync::atomic::Ordering;

/// Liveness probe endpoint. The process answering is enough.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe endpoint. Returns OK after the first poll cycle completes.
#[tracing::instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<&'static str, StatusCode> {
    if state.readiness.load(Ordering::Acquire) {
        Ok("READY")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}
