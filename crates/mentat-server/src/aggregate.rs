//! Latency Aggregate
//!
//! Holds the `node_latency` histogram, one series per (origin, destination)
//! label pair. The aggregate owns its own `prometheus::Registry` instead of
//! registering against the process-wide default one, so the scheduler and the
//! exporter share it by `Arc` and tests can build as many as they like.
//!
//! Bucket boundaries are fixed at construction: `{1, 2, 5, 6, 10}` seconds
//! plus the implicit `+Inf` bucket.

use prometheus::{Encoder, HistogramOpts, HistogramVec, Registry, TextEncoder};
use std::collections::BTreeMap;
use thiserror::Error;

/// Metric name exposed to scrapers
pub const METRIC_NAME: &str = "node_latency";

/// Help text attached to the metric
pub const METRIC_HELP: &str = "Time taken to ping other nodes";

/// Label carrying the local node identity
pub const ORIGIN_LABEL: &str = "origin_node";

/// Label carrying the probed node identity
pub const DESTINATION_LABEL: &str = "destination_node";

/// Upper bounds in seconds, excluding `+Inf`
pub const BUCKETS: [f64; 5] = [1.0, 2.0, 5.0, 6.0, 10.0];

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to register node_latency histogram: {0}")]
    Registration(#[source] prometheus::Error),
    #[error("failed to encode metrics: {0}")]
    Encode(#[source] prometheus::Error),
    #[error("encoded metrics are not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Point-in-time view of one (origin, destination) series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    pub origin: String,
    pub destination: String,
    /// Cumulative counts as `(upper_bound, count)`, ending with `+Inf`
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum: f64,
}

/// Immutable view of every series, ordered by (origin, destination).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateSnapshot {
    pub series: Vec<SeriesSnapshot>,
}

impl AggregateSnapshot {
    /// Look up the series for a label pair, if it was ever observed.
    pub fn get(&self, origin: &str, destination: &str) -> Option<&SeriesSnapshot> {
        self.series
            .iter()
            .find(|s| s.origin == origin && s.destination == destination)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Concurrent-safe latency histogram keyed by (origin, destination).
///
/// `observe` and `snapshot` only take the short per-series locks inside the
/// `prometheus` histogram, so a scrape never stalls the poll loop.
pub struct MetricsAggregate {
    registry: Registry,
    histogram: HistogramVec,
}

impl MetricsAggregate {
    /// Create an aggregate backed by a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Create an aggregate that registers `node_latency` into `registry`.
    ///
    /// Fails if the registry already holds a collector with the same name.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let opts = HistogramOpts::new(METRIC_NAME, METRIC_HELP).buckets(BUCKETS.to_vec());
        let histogram = HistogramVec::new(opts, &[ORIGIN_LABEL, DESTINATION_LABEL])
            .map_err(MetricsError::Registration)?;

        registry
            .register(Box::new(histogram.clone()))
            .map_err(MetricsError::Registration)?;

        Ok(Self {
            registry,
            histogram,
        })
    }

    /// Record one RTT sample in seconds. The series is created on first use.
    pub fn observe(&self, origin: &str, destination: &str, value_seconds: f64) {
        self.histogram
            .with_label_values(&[origin, destination])
            .observe(value_seconds);
    }

    /// Collect a consistent view of all series.
    pub fn snapshot(&self) -> AggregateSnapshot {
        let mut by_pair = BTreeMap::new();

        for family in self.registry.gather() {
            if family.get_name() != METRIC_NAME {
                continue;
            }

            for metric in family.get_metric() {
                let mut origin = String::new();
                let mut destination = String::new();
                for label in metric.get_label() {
                    match label.get_name() {
                        ORIGIN_LABEL => origin = label.get_value().to_string(),
                        DESTINATION_LABEL => destination = label.get_value().to_string(),
                        _ => {}
                    }
                }

                let histogram = metric.get_histogram();
                let count = histogram.get_sample_count();
                let mut buckets: Vec<(f64, u64)> = histogram
                    .get_bucket()
                    .iter()
                    .map(|b| (b.get_upper_bound(), b.get_cumulative_count()))
                    .collect();
                buckets.push((f64::INFINITY, count));

                by_pair.insert(
                    (origin.clone(), destination.clone()),
                    SeriesSnapshot {
                        origin,
                        destination,
                        buckets,
                        count,
                        sum: histogram.get_sample_sum(),
                    },
                );
            }
        }

        AggregateSnapshot {
            series: by_pair.into_values().collect(),
        }
    }

    /// Encode the registry in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(MetricsError::Encode)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_created_lazily() {
        let aggregate = MetricsAggregate::new().unwrap();
        assert!(aggregate.snapshot().is_empty());

        aggregate.observe("local", "n1", 0.003);

        let snapshot = aggregate.snapshot();
        assert_eq!(snapshot.series.len(), 1);
        assert!(snapshot.get("local", "n1").is_some());
        assert!(snapshot.get("local", "n2").is_none());
    }

    #[test]
    fn test_bucket_placement() {
        let aggregate = MetricsAggregate::new().unwrap();
        aggregate.observe("local", "n1", 0.003);
        aggregate.observe("local", "n1", 5.5);
        aggregate.observe("local", "n1", 42.0);

        let snapshot = aggregate.snapshot();
        let series = snapshot.get("local", "n1").unwrap();
        let counts: Vec<u64> = series.buckets.iter().map(|(_, c)| *c).collect();

        assert_eq!(counts, vec![1, 1, 1, 2, 2, 3]);
        assert_eq!(series.count, 3);
        assert!((series.sum - 47.503).abs() < 1e-9);
    }

    #[test]
    fn test_bucket_bounds_are_fixed() {
        let aggregate = MetricsAggregate::new().unwrap();
        aggregate.observe("local", "a", 1.0);
        aggregate.observe("local", "b", 9.0);

        for series in aggregate.snapshot().series {
            let bounds: Vec<f64> = series.buckets.iter().map(|(b, _)| *b).collect();
            assert_eq!(bounds, vec![1.0, 2.0, 5.0, 6.0, 10.0, f64::INFINITY]);
        }
    }

    #[test]
    fn test_cumulative_counts_non_decreasing() {
        let aggregate = MetricsAggregate::new().unwrap();
        let samples = [0.0, 0.5, 1.0, 1.5, 2.2, 4.9, 5.0, 5.9, 6.1, 9.99, 10.0, 10.01, 100.0];
        for (i, value) in samples.iter().enumerate() {
            let destination = if i % 2 == 0 { "even" } else { "odd" };
            aggregate.observe("local", destination, *value);
        }

        for series in aggregate.snapshot().series {
            for pair in series.buckets.windows(2) {
                assert!(pair[0].1 <= pair[1].1, "buckets decreased: {:?}", series.buckets);
            }
            assert_eq!(series.buckets.last().map(|(_, c)| *c), Some(series.count));
        }
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let aggregate = MetricsAggregate::new().unwrap();
        aggregate.observe("local", "n1", 0.2);
        aggregate.observe("local", "n2", 3.0);

        assert_eq!(aggregate.snapshot(), aggregate.snapshot());
        assert_eq!(aggregate.render().unwrap(), aggregate.render().unwrap());
    }

    #[test]
    fn test_snapshot_ordered_by_label_pair() {
        let aggregate = MetricsAggregate::new().unwrap();
        aggregate.observe("local", "zeta", 0.1);
        aggregate.observe("local", "alpha", 0.1);

        let destinations: Vec<String> = aggregate
            .snapshot()
            .series
            .into_iter()
            .map(|s| s.destination)
            .collect();
        assert_eq!(destinations, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        assert!(MetricsAggregate::with_registry(registry.clone()).is_ok());

        let err = MetricsAggregate::with_registry(registry).err().unwrap();
        assert!(matches!(err, MetricsError::Registration(_)));
    }

    #[test]
    fn test_render_exposition_format() {
        let aggregate = MetricsAggregate::new().unwrap();
        aggregate.observe("local", "n1", 0.003);

        let text = aggregate.render().unwrap();
        assert!(text.contains("# TYPE node_latency histogram"));

        let first_bucket = text
            .lines()
            .find(|l| l.starts_with("node_latency_bucket") && l.contains("le=\"1\""))
            .unwrap();
        assert!(first_bucket.contains("origin_node=\"local\""));
        assert!(first_bucket.contains("destination_node=\"n1\""));
        assert!(first_bucket.ends_with(" 1"));
        assert!(text.contains("le=\"+Inf\""));
    }

    #[test]
    fn test_concurrent_observe_and_snapshot() {
        let aggregate = std::sync::Arc::new(MetricsAggregate::new().unwrap());

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let aggregate = aggregate.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        aggregate.observe("local", &format!("n{w}"), 0.01);
                    }
                })
            })
            .collect();

        for _ in 0..20 {
            for series in aggregate.snapshot().series {
                assert_eq!(series.buckets[0].1, series.count);
            }
        }

        for writer in writers {
            writer.join().unwrap();
        }

        let snapshot = aggregate.snapshot();
        assert_eq!(snapshot.series.len(), 4);
        assert!(snapshot.series.iter().all(|s| s.count == 250));
    }
}
