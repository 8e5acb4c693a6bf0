//! Structured Events
//!
//! One function per event so field names stay identical across call sites.
//!
//! Event types:
//! - `node_list_fetched` - discovery returned a snapshot
//! - `probe_succeeded` - RTT recorded for a destination
//! - `probe_failed` - no RTT for a destination this tick
//! - `tick_completed` - one poll cycle finished

use std::time::Duration;
use tracing::{debug, info, warn};

pub fn node_list_fetched(backend: &str, node_count: usize) {
    debug!(
        event_type = "node_list_fetched",
        backend = %backend,
        node_count = node_count,
        "Node list fetched"
    );
}

pub fn probe_succeeded(origin: &str, destination: &str, rtt: Duration) {
    debug!(
        event_type = "probe_succeeded",
        origin_node = %origin,
        destination_node = %destination,
        rtt_seconds = rtt.as_secs_f64(),
        "Probe succeeded"
    );
}

pub fn probe_failed(destination: &str, kind: &str, error: &str) {
    warn!(
        event_type = "probe_failed",
        destination_node = %destination,
        kind = %kind,
        error = %error,
        "Failed pinging node"
    );
}

pub fn tick_completed(sequence: u64, discovered: usize, succeeded: usize, failed: usize, elapsed: Duration) {
    info!(
        event_type = "tick_completed",
        sequence = sequence,
        discovered = discovered,
        succeeded = succeeded,
        failed = failed,
        elapsed_seconds = elapsed.as_secs_f64(),
        "Poll cycle completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_functions_dont_panic() {
        node_list_fetched("kube", 3);
        probe_succeeded("node-a", "node-b", Duration::from_micros(350));
        probe_failed("node-c", "timeout", "no echo reply");
        tick_completed(1, 3, 2, 1, Duration::from_secs(31));
        tick_completed(2, 1, 0, 1, Duration::MAX);
    }
}
