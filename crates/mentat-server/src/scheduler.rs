//! Poll Loop
//!
//! Drives the cycle `Discovering -> Probing -> Sleeping -> Discovering`:
//! fetch the node list, probe every node, record each RTT under
//! `(origin, destination)`, sleep, repeat.
//!
//! Failure policy:
//! - discovery error or empty node list: the loop halts with an error and the
//!   process is expected to exit (a node that cannot see the cluster has no
//!   useful work to do; the supervisor restarts it)
//! - probe failure: logged, no observation for that node this cycle, the
//!   remaining nodes are still probed
//!
//! The loop watches its shutdown channel during every phase. A shutdown that
//! arrives mid-cycle drops the in-flight probes; observations already recorded
//! stay in the aggregate.

use crate::aggregate::MetricsAggregate;
use crate::discovery::{DiscoveryError, NodeDirectory, NodeIdentifier};
use crate::observability::{events, metrics};
use crate::probe::Prober;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::Instant;
use tracing::info;

/// Poll loop tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between cycles
    pub poll_interval: Duration,
    /// Probes in flight at once; 1 keeps probing strictly sequential
    pub probe_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            probe_concurrency: 1,
        }
    }
}

/// Poll loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the node list
    Discovering,
    /// Probing the current snapshot
    Probing,
    /// Waiting for the next cycle
    Sleeping,
    /// Stopped by a fatal discovery condition
    Halted,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("failed getting node list from {backend} backend: {source}")]
    Discovery {
        backend: &'static str,
        #[source]
        source: DiscoveryError,
    },
    #[error("{backend} backend returned 0 nodes")]
    EmptySnapshot { backend: &'static str },
}

/// Outcome of one cycle, in completion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub sequence: u64,
    pub discovered: usize,
    pub succeeded: Vec<NodeIdentifier>,
    pub failed: Vec<NodeIdentifier>,
}

pub struct Scheduler {
    origin: NodeIdentifier,
    directory: Arc<dyn NodeDirectory>,
    prober: Arc<dyn Prober>,
    aggregate: Arc<MetricsAggregate>,
    config: SchedulerConfig,
    readiness: Arc<AtomicBool>,
    state: SchedulerState,
    sequence: u64,
}

impl Scheduler {
    pub fn new(
        origin: NodeIdentifier,
        directory: Arc<dyn NodeDirectory>,
        prober: Arc<dyn Prober>,
        aggregate: Arc<MetricsAggregate>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            origin,
            directory,
            prober,
            aggregate,
            config,
            readiness: Arc::new(AtomicBool::new(false)),
            state: SchedulerState::Discovering,
            sequence: 0,
        }
    }

    /// Flag set once the first cycle has completed.
    pub fn with_readiness(mut self, readiness: Arc<AtomicBool>) -> Self {
        self.readiness = readiness;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run one discovery and probe pass without sleeping.
    pub async fn tick(&mut self) -> Result<TickReport, SchedulerError> {
        self.sequence += 1;
        let started = Instant::now();
        let backend = self.directory.backend();

        self.state = SchedulerState::Discovering;
        let nodes = match self.directory.list_nodes().await {
            Ok(nodes) if nodes.is_empty() => {
                self.state = SchedulerState::Halted;
                return Err(SchedulerError::EmptySnapshot { backend });
            }
            Ok(nodes) => nodes,
            Err(source) => {
                self.state = SchedulerState::Halted;
                return Err(SchedulerError::Discovery { backend, source });
            }
        };

        events::node_list_fetched(backend, nodes.len());
        metrics::set_discovered_nodes(nodes.len());

        self.state = SchedulerState::Probing;
        let mut report = TickReport {
            sequence: self.sequence,
            discovered: nodes.len(),
            ..TickReport::default()
        };

        let prober = self.prober.clone();
        let mut probes = futures::stream::iter(nodes)
            .map(move |node| {
                let prober = prober.clone();
                async move {
                    let outcome = prober.probe(&node).await;
                    (node, outcome)
                }
            })
            .buffer_unordered(self.config.probe_concurrency.max(1));

        while let Some((node, outcome)) = probes.next().await {
            match outcome {
                Ok(rtt) => {
                    self.aggregate.observe(&self.origin, &node, rtt.as_secs_f64());
                    events::probe_succeeded(&self.origin, &node, rtt);
                    metrics::record_probe(true);
                    report.succeeded.push(node);
                }
                Err(e) => {
                    events::probe_failed(&node, e.kind(), &e.to_string());
                    metrics::record_probe(false);
                    report.failed.push(node);
                }
            }
        }

        let elapsed = started.elapsed();
        events::tick_completed(
            report.sequence,
            report.discovered,
            report.succeeded.len(),
            report.failed.len(),
            elapsed,
        );
        metrics::record_tick(elapsed);

        Ok(report)
    }

    /// Run cycles until a shutdown signal arrives or discovery fails.
    ///
    /// Dropping the sender counts as a shutdown signal.
    pub async fn run(mut self, mut shutdown_rx: mpsc::UnboundedReceiver<()>) -> Result<(), SchedulerError> {
        info!(
            origin_node = %self.origin,
            backend = self.directory.backend(),
            interval = ?self.config.poll_interval,
            probe_concurrency = self.config.probe_concurrency,
            "Starting poll loop"
        );

        loop {
            if shutdown_requested(&mut shutdown_rx) {
                break;
            }

            tokio::select! {
                result = self.tick() => {
                    result?;
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown during poll cycle, abandoning in-flight probes");
                    break;
                }
            }
            self.readiness.store(true, Ordering::Release);

            self.state = SchedulerState::Sleeping;
            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        info!("Poll loop stopped");
        Ok(())
    }

    /// Run the loop on its own task.
    pub fn spawn(
        self,
        shutdown_rx: mpsc::UnboundedReceiver<()>,
    ) -> tokio::task::JoinHandle<Result<(), SchedulerError>> {
        tokio::spawn(self.run(shutdown_rx))
    }
}

fn shutdown_requested(shutdown_rx: &mut mpsc::UnboundedReceiver<()>) -> bool {
    match shutdown_rx.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => true,
        Err(TryRecvError::Empty) => false,
    }
}
