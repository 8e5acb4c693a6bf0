//! Self-instrumentation
//!
//! Operational counters for the poll loop, recorded through the `metrics`
//! facade and rendered by `metrics-exporter-prometheus`. The latency
//! histogram itself lives in `crate::aggregate`.
//!
//! Metrics tracked:
//! - `mentat_ticks_total` - counter of completed poll cycles
//! - `mentat_probes_total` - counter of probes by result
//! - `mentat_discovered_nodes` - gauge of nodes in the last snapshot
//! - `mentat_tick_duration_seconds` - histogram of poll cycle durations

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Handle used by the `/metrics` endpoint to render self metrics
#[derive(Clone)]
pub struct MetricsState {
    pub prometheus_handle: PrometheusHandle,
}

/// Install the global recorder and describe every metric.
pub fn init_metrics() -> Result<MetricsState, Box<dyn std::error::Error + Send + Sync>> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    register_metric_descriptions();

    Ok(MetricsState {
        prometheus_handle: handle,
    })
}

fn register_metric_descriptions() {
    describe_counter!("mentat_ticks_total", "Total number of completed poll cycles");
    describe_counter!("mentat_probes_total", "Total number of probes by result");
    describe_gauge!(
        "mentat_discovered_nodes",
        "Number of nodes returned by the last discovery query"
    );
    describe_histogram!(
        "mentat_tick_duration_seconds",
        "Duration of a full discovery and probe cycle in seconds"
    );
}

/// Record the outcome of one probe
pub fn record_probe(success: bool) {
    let result = if success { "success" } else { "failure" };
    counter!("mentat_probes_total", "result" => result).increment(1);
}

/// Update the discovered nodes gauge
pub fn set_discovered_nodes(count: usize) {
    gauge!("mentat_discovered_nodes").set(count as f64);
}

/// Record a completed poll cycle
pub fn record_tick(duration: Duration) {
    counter!("mentat_ticks_total").increment(1);
    histogram!("mentat_tick_duration_seconds").record(duration.as_secs_f64());
}
