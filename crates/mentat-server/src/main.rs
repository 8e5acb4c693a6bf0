//! Mentat - Cluster Latency Monitor

use anyhow::{anyhow, Context};
use clap::Parser;
use mentat_server::{
    aggregate::MetricsAggregate,
    api,
    config::{Cli, DiscoveryBackend, DiscoveryConfig, MentatConfig},
    discovery::{ClusterApiDirectory, NodeDirectory, ProxyDirectory, StaticDirectory},
    identity,
    observability::{self, LoggingConfig},
    probe::{IcmpProber, Prober},
    scheduler::{Scheduler, SchedulerError},
};
use std::future::IntoFuture;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = observability::init_logging(LoggingConfig::from_env()) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Fatal error, exiting");
            ExitCode::FAILURE
        }
    }
}

enum Exit {
    PollLoop(Result<Result<(), SchedulerError>, JoinError>),
    Server(std::io::Result<()>),
    Signal,
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Install rustls crypto provider for the kube client
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = MentatConfig::try_from(cli).context("invalid configuration")?;

    let node_name = identity::resolve_node_name().context("failed getting node name")?;
    info!(
        node_name = %node_name,
        version = env!("CARGO_PKG_VERSION"),
        "Starting mentat"
    );

    let aggregate = Arc::new(MetricsAggregate::new()?);
    let metrics_state =
        observability::init_metrics().map_err(|e| anyhow!("failed installing metrics recorder: {e}"))?;

    let directory = build_directory(&config.discovery).await?;
    info!(backend = directory.backend(), "Node discovery configured");

    let prober: Arc<dyn Prober> = Arc::new(IcmpProber::icmp(config.probe.clone()));
    let readiness = Arc::new(AtomicBool::new(false));

    let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
    let mut poll_loop = Scheduler::new(
        node_name,
        directory,
        prober,
        aggregate.clone(),
        config.scheduler.clone(),
    )
    .with_readiness(readiness.clone())
    .spawn(shutdown_rx);

    let app = api::create_router(api::AppState {
        aggregate,
        metrics_state: Some(metrics_state),
        readiness,
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "Serving metrics");

    let exit = tokio::select! {
        result = &mut poll_loop => Exit::PollLoop(result),
        result = axum::serve(listener, app).into_future() => Exit::Server(result),
        _ = shutdown_signal() => Exit::Signal,
    };

    match exit {
        Exit::PollLoop(result) => {
            result.context("poll loop task failed")??;
            Ok(())
        }
        Exit::Server(result) => {
            result.context("metrics server failed")?;
            Err(anyhow!("metrics server stopped unexpectedly"))
        }
        Exit::Signal => {
            info!("Shutdown signal received, stopping poll loop");
            let _ = shutdown_tx.send(());
            poll_loop.await.context("poll loop task failed")??;
            Ok(())
        }
    }
}

async fn build_directory(config: &DiscoveryConfig) -> anyhow::Result<Arc<dyn NodeDirectory>> {
    let directory: Arc<dyn NodeDirectory> = match config.backend {
        DiscoveryBackend::Kube => Arc::new(ClusterApiDirectory::connect(config.node_limit).await?),
        DiscoveryBackend::Proxy => Arc::new(ProxyDirectory::new(
            &config.proxy_url,
            config.token_file.as_deref(),
            config.node_limit,
        )?),
        DiscoveryBackend::Static => Arc::new(StaticDirectory::new(config.static_nodes.clone())),
    };
    Ok(directory)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
