//! Node Discovery
//!
//! A `NodeDirectory` answers one question: which nodes are in the cluster
//! right now. Three backends are provided:
//! - `ClusterApiDirectory`: lists `Node` objects through the Kubernetes API
//! - `ProxyDirectory`: same query through a local API proxy with a bearer token file
//! - `StaticDirectory`: a fixed host list
//!
//! Directories never retry. The scheduler decides what a failure means.

mod cluster_api;
mod static_list;

pub use cluster_api::{ClusterApiDirectory, ProxyDirectory, DEFAULT_NODE_LIMIT};
pub use static_list::StaticDirectory;

use async_trait::async_trait;
use thiserror::Error;

/// Opaque node name, as reported by the discovery backend.
pub type NodeIdentifier = String;

/// Node names returned by one directory query, in backend order.
pub type ClusterSnapshot = Vec<NodeIdentifier>;

/// Any failure to obtain the node list.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to build discovery client: {0}")]
    Client(#[source] kube::Error),
    #[error("node list request failed: {0}")]
    Request(#[source] kube::Error),
    #[error("invalid discovery configuration: {0}")]
    Config(String),
}

#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// Query the backend for the current node names.
    ///
    /// An empty snapshot is returned as-is; callers treat it as a failure.
    async fn list_nodes(&self) -> Result<ClusterSnapshot, DiscoveryError>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;
}
