//! Application State
//!
//! Shared state passed to all API handlers.

use crate::aggregate::MetricsAggregate;
use crate::observability::MetricsState;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub aggregate: Arc<MetricsAggregate>,
    /// Self metrics; `None` when no recorder is installed
    pub metrics_state: Option<MetricsState>,
    /// Set by the poll loop after its first completed cycle
    pub readiness: Arc<AtomicBool>,
}
