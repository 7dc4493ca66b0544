//! Periodic logging of aggregation run metrics

use customer_analytics_application::{RunMetrics, RunMetricsSnapshot};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Logs the orchestrator's run counters at a fixed interval.
#[derive(Clone)]
pub struct MetricsReporter {
    metrics: RunMetrics,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: RunMetrics, interval: Duration) -> Self {
        Self {
            metrics,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Log the current counters once and return them.
    pub fn report(&self) -> RunMetricsSnapshot {
        let snapshot = self.metrics.snapshot();
        info!(
            runs_started = snapshot.runs_started,
            runs_succeeded = snapshot.runs_succeeded,
            runs_failed = snapshot.runs_failed,
            runs_rejected = snapshot.runs_rejected,
            records_skipped = snapshot.records_skipped,
            success_rate = format!("{:.2}%", snapshot.success_rate * 100.0),
            avg_duration_ms = snapshot.average_duration_ms.unwrap_or(0),
            "Aggregation metrics"
        );
        snapshot
    }

    /// Report every interval until `shutdown` receives or closes.
    pub fn start(self, mut shutdown: mpsc::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            // First tick completes immediately
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.report();
                    }
                    _ = shutdown.recv() => break,
                }
            }
        })
    }
}
