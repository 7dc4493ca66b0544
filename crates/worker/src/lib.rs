//! Customer Analytics Worker
//!
//! Background scheduling for the customer analytics engine.
//!
//! This crate provides:
//! - Cron-like schedules that start aggregation passes
//! - Skipping of scheduled passes while another pass is running
//! - Periodic logging of run metrics
//!
//! The API server embeds a [`Worker`] next to its orchestrator; the `worker`
//! binary runs one standalone against persistent stores.

pub mod metrics;
pub mod scheduler;

pub use metrics::MetricsReporter;
pub use scheduler::{AggregationScheduler, CronField, Schedule, TickOutcome};

use anyhow::Result;
use customer_analytics_application::AggregationOrchestrator;
use customer_analytics_common::config::SchedulerSettings;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Scheduler and metrics reporter sharing one orchestrator
pub struct Worker {
    scheduler: Option<AggregationScheduler>,
    reporter: MetricsReporter,
    shutdown_tx: mpsc::Sender<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl Worker {
    /// Build from settings. The scheduler is left out when disabled.
    pub fn new(orchestrator: Arc<AggregationOrchestrator>, settings: &SchedulerSettings) -> Result<Self> {
        let scheduler = if settings.enabled {
            Some(AggregationScheduler::new(orchestrator.clone(), settings)?)
        } else {
            None
        };
        let reporter = MetricsReporter::new(
            orchestrator.metrics().clone(),
            Duration::from_secs(settings.metrics_interval_seconds),
        );
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        Ok(Self {
            scheduler,
            reporter,
            shutdown_tx,
            shutdown_rx,
        })
    }

    pub fn scheduler_enabled(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Get a handle to send shutdown signal
    pub fn shutdown_handle(&self) -> mpsc::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until a shutdown signal arrives.
    pub async fn run(mut self) -> Result<()> {
        info!(scheduler_enabled = self.scheduler.is_some(), "Starting worker");

        let (scheduler_tx, scheduler_rx) = mpsc::channel(1);
        let (reporter_tx, reporter_rx) = mpsc::channel(1);

        let scheduler_handle = self.scheduler.take().map(|s| s.start(scheduler_rx));
        let reporter_handle = self.reporter.clone().start(reporter_rx);

        // Wait for shutdown signal
        self.shutdown_rx.recv().await;
        info!("Shutting down worker");

        drop(scheduler_tx);
        drop(reporter_tx);

        if let Some(handle) = scheduler_handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler task failed");
            }
        }
        if let Err(e) = reporter_handle.await {
            error!(error = %e, "Metrics reporter task failed");
        }

        self.reporter.report();
        Ok(())
    }
}
