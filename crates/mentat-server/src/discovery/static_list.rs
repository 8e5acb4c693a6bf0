//! Fixed node list, for hosts outside Kubernetes.

use super::{ClusterSnapshot, DiscoveryError, NodeDirectory};
use async_trait::async_trait;

pub struct StaticDirectory {
    nodes: ClusterSnapshot,
}

impl StaticDirectory {
    /// Blank entries are dropped; order is preserved.
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes = nodes
            .into_iter()
            .map(Into::into)
            .map(|n: String| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        Self { nodes }
    }
}

#[async_trait]
impl NodeDirectory for StaticDirectory {
    async fn list_nodes(&self) -> Result<ClusterSnapshot, DiscoveryError> {
        Ok(self.nodes.clone())
    }

    fn backend(&self) -> &'static str {
        "static"
    }
}
