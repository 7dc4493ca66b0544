//! Customer Analytics Worker
//!
//! Runs scheduled aggregation passes without the HTTP API. Intended for
//! deployments with persistent stores (postgres events, S3 or local snapshots)
//! where this worker is the only snapshot writer: every API server sharing
//! the stores runs with `aggregation.api_triggers = false`.

use anyhow::{Context, Result};
use clap::Parser;
use customer_analytics_common::config::AppConfig;
use customer_analytics_common::telemetry;
use customer_analytics_infrastructure::bootstrap;
use customer_analytics_worker::Worker;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "worker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cron expression overriding scheduler.cron
    #[arg(long, env = "WORKER_CRON")]
    cron: Option<String>,

    /// Run one aggregation pass immediately, then exit
    #[arg(long)]
    once: bool,

    /// Metrics logging interval in seconds
    #[arg(long, env = "METRICS_INTERVAL")]
    metrics_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init_from_config(&config.telemetry)?;

    // A standalone worker always schedules
    config.scheduler.enabled = true;
    if let Some(cron) = args.cron {
        config.scheduler.cron = cron;
    }
    if let Some(interval) = args.metrics_interval {
        config.scheduler.metrics_interval_seconds = interval;
    }

    info!(
        cron = %config.scheduler.cron,
        event_store = ?config.event_store.backend,
        snapshot_store = ?config.snapshot_store.backend,
        "Starting customer analytics worker"
    );

    let components = bootstrap::assemble(&config)
        .await
        .context("Failed to connect stores")?;
    let orchestrator = components.orchestrator.clone();

    if args.once {
        let outcome = orchestrator
            .run_aggregation(orchestrator.default_request(chrono::Utc::now()))
            .await?;
        info!(
            run_id = %outcome.run_id,
            sequence = outcome.sequence,
            customers = outcome.metrics.total_customers,
            duration_ms = outcome.duration_ms,
            "Aggregation pass complete"
        );
        return Ok(());
    }

    let worker = Worker::new(orchestrator, &config.scheduler)?;
    let shutdown_handle = worker.shutdown_handle();

    // Setup graceful shutdown
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Received shutdown signal");
        let _ = shutdown_handle.send(()).await;
    });

    worker.run().await?;
    info!("Worker shut down gracefully");

    Ok(())
}
