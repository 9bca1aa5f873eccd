//! Beekeeper daemon binary.

use anyhow::{Context, Result};
use beekeeper_server::scheduler::{
    run_cleanup_cycle, run_retention_sweep, spawn_cleanup_loop, spawn_retention_loop,
};
use beekeeper_server::{AppState, load_config};
use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Beekeeper - lifecycle cleanup for tables and data paths on object storage
#[derive(Parser, Debug)]
#[command(name = "beekeeperd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "BEEKEEPER_CONFIG",
        default_value = "config/beekeeper.toml"
    )]
    config: String,

    /// Run one cleanup cycle (and one retention sweep if enabled), print the
    /// cycle report as JSON and exit
    #[arg(long)]
    once: bool,

    /// Log what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Beekeeper v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&args.config)?;
    if args.dry_run {
        config.cleanup.dry_run = true;
    }

    beekeeper_cleanup::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let storage = beekeeper_storage::from_config(&config.storage)
        .await
        .context("failed to initialize storage")?;
    tracing::info!(backend = storage.backend_name(), "Storage backend initialized");

    let metadata = beekeeper_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("Metadata store initialized");

    // The stock binary has no metastore client; embedders pass theirs to AppState::new.
    let state = AppState::new(config, storage, metadata, None);
    tracing::info!(lifecycles = ?state.active_lifecycles(), "Cleanup engine ready");

    if args.once {
        if state.config.cleanup.enabled {
            let report = run_cleanup_cycle(&state).await;
            println!("{}", serde_json::to_string(&report)?);
        }
        if state.config.retention.enabled {
            run_retention_sweep(&state).await;
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();

    if state.config.cleanup.enabled {
        tasks.push(spawn_cleanup_loop(state.clone(), shutdown_rx.clone()));
    } else {
        tracing::warn!("Cleanup is disabled by configuration");
    }
    if state.config.retention.enabled {
        tasks.push(spawn_retention_loop(state.clone(), shutdown_rx));
    } else {
        tracing::info!("Retention sweep is disabled by configuration");
    }

    if tasks.is_empty() {
        tracing::warn!("Nothing to schedule, exiting");
        return Ok(());
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested, waiting for running cycles to finish");

    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
    }

    tracing::info!("Beekeeper stopped");
    Ok(())
}
