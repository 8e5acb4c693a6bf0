//! Daemon Configuration
//!
//! Every setting is a CLI flag that can also be supplied through the
//! environment, which is how the DaemonSet manifest configures it. `Cli` is
//! validated into a `MentatConfig` before anything starts.

use crate::discovery::DEFAULT_NODE_LIMIT;
use crate::probe::ProbeConfig;
use crate::scheduler::SchedulerConfig;
use clap::{Parser, ValueEnum};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("static discovery requires at least one node (--static-nodes / STATIC_NODES)")]
    NoStaticNodes,
}

/// Where the node list comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DiscoveryBackend {
    /// Kubernetes API via in-cluster service account or kubeconfig
    Kube,
    /// Kubernetes API through a local proxy
    Proxy,
    /// Fixed list of hosts
    Static,
}

#[derive(Debug, Parser)]
#[command(name = "mentat")]
#[command(about = "Measures ICMP round-trip time to every cluster node and exports it to Prometheus")]
#[command(version)]
pub struct Cli {
    /// Address the metrics endpoint listens on
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:2112")]
    pub listen_addr: SocketAddr,

    /// Node discovery backend
    #[arg(long, env = "DISCOVERY_BACKEND", value_enum, default_value_t = DiscoveryBackend::Kube)]
    pub discovery: DiscoveryBackend,

    /// Base URL of the API proxy (proxy backend)
    #[arg(long, env = "KUBE_PROXY_URL", default_value = "http://127.0.0.1:8001")]
    pub proxy_url: String,

    /// Bearer token file sent to the API proxy (proxy backend)
    #[arg(long, env = "KUBE_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Comma-separated hosts to probe (static backend)
    #[arg(long, env = "STATIC_NODES", value_delimiter = ',')]
    pub static_nodes: Vec<String>,

    /// Maximum nodes requested per discovery query
    #[arg(long, env = "NODE_LIST_LIMIT", default_value_t = DEFAULT_NODE_LIMIT)]
    pub node_limit: u32,

    /// Seconds to sleep between poll cycles
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Overall budget for one probe, shared by all attempts
    #[arg(long, env = "PROBE_TIMEOUT_SECS", default_value_t = 30)]
    pub probe_timeout_secs: u64,

    /// Echo requests per probe
    #[arg(long, env = "PROBE_ATTEMPTS", default_value_t = 3)]
    pub probe_attempts: u16,

    /// Probes in flight per cycle; 1 probes nodes one after another
    #[arg(long, env = "PROBE_CONCURRENCY", default_value_t = 1)]
    pub probe_concurrency: usize,

    /// Source address for echo requests
    #[arg(long, env = "PROBE_BIND_ADDR", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub bind_addr: IpAddr,
}

/// Discovery settings
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub backend: DiscoveryBackend,
    pub proxy_url: String,
    pub token_file: Option<PathBuf>,
    pub static_nodes: Vec<String>,
    pub node_limit: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            backend: DiscoveryBackend::Kube,
            proxy_url: "http://127.0.0.1:8001".to_string(),
            token_file: None,
            static_nodes: Vec::new(),
            node_limit: DEFAULT_NODE_LIMIT,
        }
    }
}

/// Validated daemon configuration
#[derive(Debug, Clone)]
pub struct MentatConfig {
    pub listen_addr: SocketAddr,
    pub discovery: DiscoveryConfig,
    pub probe: ProbeConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for MentatConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 2112)),
            discovery: DiscoveryConfig::default(),
            probe: ProbeConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl TryFrom<Cli> for MentatConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.poll_interval_secs == 0 {
            return Err(ConfigError::Zero("poll interval"));
        }
        if cli.probe_timeout_secs == 0 {
            return Err(ConfigError::Zero("probe timeout"));
        }
        if cli.probe_attempts == 0 {
            return Err(ConfigError::Zero("probe attempts"));
        }
        if cli.probe_concurrency == 0 {
            return Err(ConfigError::Zero("probe concurrency"));
        }
        if cli.node_limit == 0 {
            return Err(ConfigError::Zero("node limit"));
        }

        let static_nodes: Vec<String> = cli
            .static_nodes
            .into_iter()
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .collect();

        if cli.discovery == DiscoveryBackend::Static && static_nodes.is_empty() {
            return Err(ConfigError::NoStaticNodes);
        }

        Ok(Self {
            listen_addr: cli.listen_addr,
            discovery: DiscoveryConfig {
                backend: cli.discovery,
                proxy_url: cli.proxy_url,
                token_file: cli.token_file,
                static_nodes,
                node_limit: cli.node_limit,
            },
            probe: ProbeConfig {
                attempts: cli.probe_attempts,
                timeout: Duration::from_secs(cli.probe_timeout_secs),
                bind_addr: cli.bind_addr,
                ..ProbeConfig::default()
            },
            scheduler: SchedulerConfig {
                poll_interval: Duration::from_secs(cli.poll_interval_secs),
                probe_concurrency: cli.probe_concurrency,
            },
        })
    }
}
