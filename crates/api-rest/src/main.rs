//! Customer Analytics API server
//!
//! Hosts the orchestrator, the embedded scheduler and the HTTP API in one
//! process. With `aggregation.api_triggers = false` the server only reads
//! snapshots and a standalone worker runs every pass.

use anyhow::{Context, Result};
use customer_analytics_api_rest::{create_app, AppState};
use customer_analytics_application::ServiceConfig;
use customer_analytics_common::config::AppConfig;
use customer_analytics_common::telemetry;
use customer_analytics_infrastructure::bootstrap;
use customer_analytics_worker::Worker;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init_from_config(&config.telemetry)?;

    info!(
        event_store = ?config.event_store.backend,
        snapshot_store = ?config.snapshot_store.backend,
        scheduler_enabled = config.scheduler.enabled,
        api_triggers = config.aggregation.api_triggers,
        "Starting customer analytics API"
    );

    let components = bootstrap::assemble(&config)
        .await
        .context("Failed to connect stores")?;

    let embedded = if config.aggregation.api_triggers {
        let worker = Worker::new(components.orchestrator.clone(), &config.scheduler)?;
        let shutdown = worker.shutdown_handle();
        Some((shutdown, tokio::spawn(worker.run())))
    } else {
        info!("Aggregation passes are run by a standalone worker");
        None
    };

    let state = AppState::new(Arc::new(components.service(ServiceConfig::from(&config))));
    let app = create_app(state, &config.server);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!(address = %address, "Server ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some((shutdown, handle)) = embedded {
        let _ = shutdown.send(()).await;
        match handle.await {
            Ok(Err(e)) => error!(error = %e, "Worker stopped with an error"),
            Err(e) => error!(error = %e, "Worker task failed"),
            Ok(Ok(())) => {}
        }
    }

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
