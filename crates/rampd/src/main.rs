//! rampd — the ramp rollout controller daemon.
//!
//! Single process hosting the object store, the reconciliation
//! scheduler, the plan relay, and the REST API.
//!
//! # Usage
//!
//! ```text
//! rampd run --port 8443 --data-dir /var/lib/ramp
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use ramp_core::{ObjectKey, SystemClock};
use ramp_scheduler::{PlanRelay, Reconciler, Scheduler, WorkQueue};
use ramp_state::StateStore;

#[derive(Parser)]
#[command(name = "rampd", about = "ramp rollout controller daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller (store, scheduler, relay, and API in one process).
    Run {
        /// Port to serve the REST API on.
        #[arg(long, default_value = "8443")]
        port: u16,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/ramp")]
        data_dir: PathBuf,

        /// Number of reconciliation workers.
        #[arg(long, default_value = "4")]
        workers: usize,

        /// Plan relay interval in milliseconds.
        #[arg(long, default_value = "500")]
        relay_interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rampd=debug,ramp=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            port,
            data_dir,
            workers,
            relay_interval_ms,
        } => run(port, data_dir, workers, relay_interval_ms).await,
    }
}

async fn run(
    port: u16,
    data_dir: PathBuf,
    workers: usize,
    relay_interval_ms: u64,
) -> anyhow::Result<()> {
    info!("ramp controller starting");

    // Ensure data directory exists.
    std::fs::create_dir_all(&data_dir)?;
    let db_path = data_dir.join("ramp.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "object store opened");

    let queue = WorkQueue::new();
    let followup_queue = queue.clone();
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        Arc::new(SystemClock),
        Arc::new(move |key: &ObjectKey, delay: Duration| {
            followup_queue.enqueue_after(key, delay);
        }),
    ));
    let scheduler = Scheduler::new(queue.clone(), reconciler);
    info!(workers, "scheduler initialized");

    let relay = PlanRelay::new(store.clone());
    info!(interval_ms = relay_interval_ms, "plan relay initialized");

    // Known configurations get one delivery on boot: wakes recorded
    // before a restart are re-armed from their plan states.
    let mut rearmed = 0;
    for cfg in store.list_configurations()? {
        queue.enqueue(&cfg.key());
        rearmed += 1;
    }
    info!(configurations = rearmed, "boot reconciliation queued");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_shutdown = shutdown_rx.clone();
    let relay_shutdown = shutdown_rx;

    // ── Start background tasks ─────────────────────────────────

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(workers, scheduler_shutdown).await;
    });

    let relay_handle = tokio::spawn(async move {
        relay
            .run(Duration::from_millis(relay_interval_ms), relay_shutdown)
            .await;
    });

    // ── Start API server ───────────────────────────────────────

    let router = ramp_api::build_router(store, queue);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = scheduler_handle.await;
    let _ = relay_handle.await;

    info!("ramp controller stopped");
    Ok(())
}
