//! hived — the HiveGrid daemon.
//!
//! Single binary that assembles the scheduling pipeline:
//! - Fleet (standalone in-memory mode, seeded from the config's node list)
//! - Dispatch queue
//! - Batcher tick loop
//! - Controller drain loop
//! - Metrics
//!
//! # Usage
//!
//! ```text
//! hived start --config hive.toml
//! hived kill --config hive.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use hive_core::config::HiveConfig;
use hive_core::types::OperationKind;
use hivegrid_dispatch::DispatchQueue;
use hivegrid_fleet::SimFleet;
use hivegrid_metrics::SchedulerMetrics;
use hivegrid_scheduler::{Batcher, BatcherConfig, Controller};

#[derive(Parser)]
#[command(name = "hived", about = "HiveGrid daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Boot the batcher and controller together.
    Start {
        /// Path to hive.toml. Defaults apply if omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the scheduling tick interval in milliseconds.
        #[arg(long)]
        tick_interval_ms: Option<u64>,
    },
    /// Clear the dispatch queue and kill all workers. Safe to repeat.
    Kill {
        /// Path to hive.toml. Defaults apply if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hived=debug,hivegrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Start {
            config,
            tick_interval_ms,
        } => run_start(config, tick_interval_ms).await,
        Command::Kill { config } => run_kill(config),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<HiveConfig> {
    match path {
        Some(path) => HiveConfig::from_file(&path),
        None => Ok(HiveConfig::default()),
    }
}

/// Build the standalone fleet: seed the static node list, register
/// per-binary launch costs, and pre-stage every worker binary on home.
fn build_fleet(config: &HiveConfig) -> Arc<SimFleet> {
    let fleet = Arc::new(SimFleet::with_nodes(config.nodes.clone()));
    for kind in [
        OperationKind::Hack,
        OperationKind::Weaken,
        OperationKind::Grow,
        OperationKind::Share,
    ] {
        let path = format!("{}/{}", config.fleet.payload_dir, kind.binary_name());
        fleet.set_binary_cost(&path, config.costs.cost_of(kind));
        fleet.seed_binary(&config.fleet.home, &path);
    }
    fleet
}

async fn run_start(
    config_path: Option<PathBuf>,
    tick_interval_ms: Option<u64>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let tick_interval =
        Duration::from_millis(tick_interval_ms.unwrap_or(config.scheduler.tick_interval_ms));
    // Drain faster than the batcher produces so the queue stays shallow.
    let drain_interval = Duration::from_millis((tick_interval.as_millis() as u64 / 2).max(10));

    info!(nodes = config.nodes.len(), "HiveGrid daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let fleet = build_fleet(&config);
    info!(home = %config.fleet.home, "fleet initialized");

    let queue = Arc::new(DispatchQueue::new(config.scheduler.queue_capacity));
    info!(capacity = queue.capacity(), "dispatch queue initialized");

    let metrics = Arc::new(SchedulerMetrics::new());

    let batcher = Arc::new(Batcher::new(
        fleet.clone(),
        queue.clone(),
        metrics.clone(),
        BatcherConfig::from_hive(&config),
    ));
    info!("batcher initialized");

    let controller = Arc::new(Controller::new(
        fleet.clone(),
        queue.clone(),
        metrics.clone(),
        config.fleet.payload_dir.clone(),
    ));
    info!("controller initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let batcher_shutdown = shutdown_rx.clone();
    let controller_shutdown = shutdown_rx;

    // ── Start loops ────────────────────────────────────────────

    let batcher_handle = tokio::spawn({
        let batcher = batcher.clone();
        async move {
            batcher.run(tick_interval, batcher_shutdown).await;
        }
    });

    let controller_handle = tokio::spawn({
        let controller = controller.clone();
        async move {
            controller.run(drain_interval, controller_shutdown).await;
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = batcher_handle.await;
    let _ = controller_handle.await;

    // In-flight workers are left to finish — shutdown stops future
    // scheduling, it does not cancel launches.
    let snapshot = metrics.snapshot();
    info!(
        launched = snapshot.launched,
        placement_rate = snapshot.placement_rate,
        queue_drops = snapshot.queue_drops,
        "HiveGrid daemon stopped"
    );
    Ok(())
}

fn run_kill(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let fleet = build_fleet(&config);
    let queue = Arc::new(DispatchQueue::new(config.scheduler.queue_capacity));
    let metrics = Arc::new(SchedulerMetrics::new());
    let controller = Controller::new(
        fleet,
        queue,
        metrics,
        config.fleet.payload_dir.clone(),
    );

    let report = controller.reset()?;
    info!(
        cleared = report.cleared_entries,
        killed = report.killed_processes,
        "kill complete"
    );
    Ok(())
}
