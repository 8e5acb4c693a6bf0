//! Observability Module
//!
//! - `logging`: tracing subscriber setup (text or JSON)
//! - `events`: structured log events with consistent field names
//! - `metrics`: self-instrumentation counters for the poll loop

pub mod events;
pub mod logging;
pub mod metrics;

pub use self::logging::{init_logging, LoggingConfig};
pub use self::metrics::{init_metrics, MetricsState};
