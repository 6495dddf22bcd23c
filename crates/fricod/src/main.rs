//! fricod — the FRICO admission and placement controller daemon.
//!
//! Single binary that assembles the subsystems:
//! - Kubernetes cluster adapter (node discovery, workload lifecycle)
//! - Placement engine behind its single-mutex handle
//! - Serialized arrival pipeline (one worker)
//! - Completion watcher
//! - HTTP front-end (arrivals, health, Prometheus metrics)
//!
//! # Usage
//!
//! ```text
//! MAX_REALLOC=2 SIMULATION_NAME=run1 fricod --port 8080 --namespace tasks
//! ```

mod config;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use frico_api::{ApiState, build_router, pipeline};
use frico_cluster::{ClusterOps, CompletionWatcher, KubeCluster};
use frico_engine::{EngineHandle, Frico, Node};
use frico_metrics::{AuditLog, SimulationMetrics, write_simulation_id};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "fricod", about = "FRICO admission and placement controller")]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Namespace that task workloads run in.
    #[arg(long, default_value = "tasks")]
    namespace: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env(cli.port, cli.namespace)?;
    init_tracing(config.log_path.as_deref())?;

    let run_id = config.run_id(epoch_secs());
    write_simulation_id("simulation.id", &run_id)?;
    info!(%run_id, max_realloc = config.max_realloc, "FRICO controller starting");

    // ── Cluster adapter + engine ───────────────────────────────
    let client = kube::Client::try_default().await?;
    let kube_cluster = KubeCluster::new(client.clone());
    let discovered = kube_cluster.discover_nodes().await?;
    let nodes: Vec<Node> = discovered
        .iter()
        .map(|n| {
            Node::new(
                n.id,
                &n.name,
                n.cpu_millicores,
                n.memory_bytes,
                n.colors.iter().cloned(),
            )
        })
        .collect();
    info!(nodes = nodes.len(), "cluster nodes discovered");

    let engine = EngineHandle::new(Frico::new(nodes, config.max_realloc));
    let cluster: Arc<dyn ClusterOps> = Arc::new(kube_cluster);
    let metrics = Arc::new(SimulationMetrics::new(run_id));
    let audit = AuditLog::new("test_bed.csv");

    // ── Shutdown signal ────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Background tasks ───────────────────────────────────────
    let (queue, worker) = pipeline::channel(
        engine.clone(),
        cluster.clone(),
        metrics.clone(),
        audit,
        config.namespace.clone(),
    );
    let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    let watcher = CompletionWatcher::new(
        client,
        config.namespace.clone(),
        engine.clone(),
        cluster.clone(),
    );
    let watcher_handle = tokio::spawn(watcher.run(shutdown_rx));

    // ── Front-end ──────────────────────────────────────────────
    let state = ApiState {
        queue,
        cluster,
        metrics,
        namespace: config.namespace.clone(),
    };
    let router = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "arrival endpoint listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    let _ = worker_handle.await;
    let _ = watcher_handle.await;
    info!("FRICO controller stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM and fan the stop out to background tasks.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
}

fn init_tracing(log_path: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,fricod=debug,frico=debug".parse().unwrap());

    match log_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
