//! Kubernetes-backed directories
//!
//! Both variants issue the same `GET /api/v1/nodes?limit=N` request and only
//! differ in how the client reaches the API server.

use super::{ClusterSnapshot, DiscoveryError, NodeDirectory};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Node;
use kube::{
    api::{Api, ListParams},
    Client, Config, ResourceExt,
};
use std::path::Path;
use tracing::{debug, warn};

/// Page size requested from the API server
pub const DEFAULT_NODE_LIMIT: u32 = 500;

/// Lists nodes using the in-cluster service account (or local kubeconfig).
pub struct ClusterApiDirectory {
    api: Api<Node>,
    limit: u32,
}

impl ClusterApiDirectory {
    pub fn new(client: Client, limit: u32) -> Self {
        Self {
            api: Api::all(client),
            limit,
        }
    }

    /// Build a client from the ambient configuration.
    pub async fn connect(limit: u32) -> Result<Self, DiscoveryError> {
        let client = Client::try_default()
            .await
            .map_err(DiscoveryError::Client)?;
        Ok(Self::new(client, limit))
    }
}

#[async_trait]
impl NodeDirectory for ClusterApiDirectory {
    async fn list_nodes(&self) -> Result<ClusterSnapshot, DiscoveryError> {
        list_node_names(&self.api, self.limit).await
    }

    fn backend(&self) -> &'static str {
        "kube"
    }
}

/// Lists nodes through a local API proxy such as `kubectl proxy`.
pub struct ProxyDirectory {
    api: Api<Node>,
    limit: u32,
}

impl ProxyDirectory {
    /// Build a client for `proxy_url`, optionally authenticating with the
    /// bearer token stored in `token_file`. The file is re-read by the client
    /// when the token rotates.
    pub fn new(proxy_url: &str, token_file: Option<&Path>, limit: u32) -> Result<Self, DiscoveryError> {
        let uri: http::Uri = proxy_url
            .parse()
            .map_err(|e| DiscoveryError::Config(format!("invalid proxy URL '{proxy_url}': {e}")))?;

        if uri.scheme().is_none() || uri.host().is_none() {
            return Err(DiscoveryError::Config(format!(
                "proxy URL '{proxy_url}' must include scheme and host"
            )));
        }

        let mut config = Config::new(uri);
        if let Some(path) = token_file {
            config.auth_info.token_file = Some(path.display().to_string());
        }

        let client = Client::try_from(config).map_err(DiscoveryError::Client)?;
        debug!(proxy_url = %proxy_url, "Proxy discovery client created");

        Ok(Self {
            api: Api::all(client),
            limit,
        })
    }
}

#[async_trait]
impl NodeDirectory for ProxyDirectory {
    async fn list_nodes(&self) -> Result<ClusterSnapshot, DiscoveryError> {
        list_node_names(&self.api, self.limit).await
    }

    fn backend(&self) -> &'static str {
        "proxy"
    }
}

async fn list_node_names(api: &Api<Node>, limit: u32) -> Result<ClusterSnapshot, DiscoveryError> {
    let nodes = api
        .list(&ListParams::default().limit(limit))
        .await
        .map_err(DiscoveryError::Request)?;

    if is_truncated(nodes.metadata.continue_.as_deref()) {
        warn!(
            limit = limit,
            returned = nodes.items.len(),
            "Node list truncated at limit, remaining nodes will not be probed"
        );
    }

    Ok(node_names(&nodes.items))
}

fn node_names(nodes: &[Node]) -> ClusterSnapshot {
    nodes.iter().map(|node| node.name_any()).collect()
}

fn is_truncated(continue_token: Option<&str>) -> bool {
    continue_token.is_some_and(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn node(name: &str) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_node_names_keep_order() {
        let nodes = vec![node("worker-2"), node("control-plane"), node("worker-1")];
        assert_eq!(node_names(&nodes), vec!["worker-2", "control-plane", "worker-1"]);
    }

    #[test]
    fn test_truncation_detection() {
        assert!(!is_truncated(None));
        assert!(!is_truncated(Some("")));
        assert!(is_truncated(Some("eyJ2IjoibWV0YS5rOHMuaW8vdjEifQ")));
    }

    #[test]
    fn test_proxy_rejects_invalid_url() {
        let err = ProxyDirectory::new("not a url", None, DEFAULT_NODE_LIMIT).err().unwrap();
        assert!(matches!(err, DiscoveryError::Config(_)));

        let err = ProxyDirectory::new("127.0.0.1:8001", None, DEFAULT_NODE_LIMIT).err().unwrap();
        assert!(matches!(err, DiscoveryError::Config(_)));
    }
}
