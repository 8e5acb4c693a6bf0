//! Mentat - Cluster Latency Monitor
//!
//! Runs on every node, discovers its peers, measures ICMP round-trip time to
//! each of them and exposes the results as the `node_latency` histogram.
//! Scraping every instance yields a node-to-node latency matrix.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod discovery;
pub mod identity;
pub mod observability;
pub mod probe;
pub mod scheduler;
