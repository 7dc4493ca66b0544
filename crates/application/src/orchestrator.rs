//! Aggregation Orchestrator
//!
//! Runs one aggregation pass at a time: fetch every event, validate, group by
//! customer, aggregate, score in two phases, reduce and save a single
//! snapshot. A pass that fails for any reason writes nothing.
//!
//! Concurrent requests are rejected with [`ApplicationError::AlreadyRunning`].
//! The exclusive run guard is an owned mutex guard, so it can be taken
//! synchronously by the caller and then moved into a spawned task. A guard
//! dropped before the outcome is recorded (a panic or a cancelled future)
//! marks its pass `Failed`, so the orchestrator always accepts the next pass.
//!
//! Mutual exclusion is per process. Deployments run passes from a single
//! process; the snapshot store additionally refuses to move its pointer
//! backwards.

use crate::aggregator::{aggregate, group_by_customer};
use crate::metrics::RunMetrics;
use crate::ports::{CampaignRevenueSource, EventStore};
use crate::reducer::reduce;
use crate::scoring::ScoringEngine;
use crate::snapshot::SnapshotStore;
use crate::ApplicationError;
use chrono::{DateTime, Utc};
use customer_analytics_common::config::AppConfig;
use customer_analytics_common::retry::{retry_with_predicate, RetryConfig};
use customer_analytics_domain::{
    validate, AggregationState, CustomerRecord, CustomerSummary, Event, MetricsSnapshot,
    RunId, RunReport, RunStatus, ScoringThresholds, SnapshotRecord,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, instrument, warn, Instrument};

/// Orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline used when a trigger does not supply one
    pub default_deadline: Duration,
    /// Threads used to aggregate and score customers
    pub workers: usize,
    /// Backoff for retryable event store errors
    pub fetch_retry: RetryConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_deadline: Duration::from_secs(300),
            workers: 1,
            fetch_retry: RetryConfig::exponential(3),
        }
    }
}

impl From<&AppConfig> for OrchestratorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_deadline: config.aggregation_deadline(),
            workers: config.aggregation.workers.max(1),
            fetch_retry: RetryConfig::exponential(config.aggregation.fetch_retries),
        }
    }
}

/// Parameters of one pass
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Reference time; events after it are not part of the pass
    pub now: DateTime<Utc>,
    /// Time allowed for fetching and computing, checked before the snapshot write
    pub deadline: Duration,
}

impl RunRequest {
    pub fn new(now: DateTime<Utc>, deadline: Duration) -> Self {
        Self { now, deadline }
    }
}

/// Result of a successful pass
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub sequence: u64,
    pub metrics: MetricsSnapshot,
    pub report: RunReport,
    pub duration_ms: u64,
}

/// Exclusive right to run a pass.
///
/// Dropping the guard releases the orchestrator for the next pass. If the
/// outcome was never recorded, the pass is marked `Failed` first.
pub struct RunGuard {
    run_id: RunId,
    status: Arc<RwLock<RunStatus>>,
    metrics: RunMetrics,
    started: Instant,
    settled: bool,
    _lock: OwnedMutexGuard<()>,
}

impl RunGuard {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut status = self.status.write();
        if let Err(e) = status.state.transition_to(AggregationState::Failed) {
            error!(error = %e, "Unexpected aggregation state");
            status.state = AggregationState::Failed;
        }
        status.current_run_id = None;
        status.last_run_id = Some(self.run_id);
        status.finished_at = Some(Utc::now());
        status.last_error = Some("Aggregation pass aborted before completion".to_string());
        self.metrics.record_failed(self.started.elapsed());
        error!(run_id = %self.run_id, "Aggregation pass aborted");
    }
}

/// Output of the CPU-bound part of a pass
struct ScoredFleet {
    thresholds: ScoringThresholds,
    customers: BTreeMap<String, CustomerRecord>,
    metrics: MetricsSnapshot,
    /// Customers whose revenue does not fit in a decimal
    overflowed: Vec<String>,
}

/// Coordinates aggregation passes
pub struct AggregationOrchestrator {
    events: Arc<dyn EventStore>,
    campaign: Arc<dyn CampaignRevenueSource>,
    snapshots: SnapshotStore,
    engine: ScoringEngine,
    config: OrchestratorConfig,
    lock: Arc<Mutex<()>>,
    status: Arc<RwLock<RunStatus>>,
    metrics: RunMetrics,
}

impl AggregationOrchestrator {
    pub fn new(
        events: Arc<dyn EventStore>,
        campaign: Arc<dyn CampaignRevenueSource>,
        snapshots: SnapshotStore,
        engine: ScoringEngine,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            events,
            campaign,
            snapshots,
            engine,
            config,
            lock: Arc::new(Mutex::new(())),
            status: Arc::new(RwLock::new(RunStatus::default())),
            metrics: RunMetrics::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn engine(&self) -> &ScoringEngine {
        &self.engine
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn status(&self) -> RunStatus {
        self.status.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.status.read().state.is_running()
    }

    /// Request using the configured default deadline.
    pub fn default_request(&self, now: DateTime<Utc>) -> RunRequest {
        RunRequest::new(now, self.config.default_deadline)
    }

    /// Take the run guard and move to `Running`, or report the active run.
    ///
    /// The status lock is held while the run guard changes hands, so an
    /// active run id is always visible while the guard is taken.
    pub fn try_begin(&self) -> Result<RunGuard, ApplicationError> {
        let mut status = self.status.write();

        let lock = match Arc::clone(&self.lock).try_lock_owned() {
            Ok(lock) => lock,
            Err(_) => {
                self.metrics.record_rejected();
                return Err(match status.current_run_id {
                    Some(run_id) => ApplicationError::AlreadyRunning { run_id },
                    None => ApplicationError::Internal(
                        "Aggregation lock held without an active run".to_string(),
                    ),
                });
            }
        };

        status
            .state
            .transition_to(AggregationState::Running)
            .map_err(|e| ApplicationError::Internal(e.to_string()))?;

        let run_id = RunId::new();
        status.current_run_id = Some(run_id);
        status.started_at = Some(Utc::now());
        status.finished_at = None;
        self.metrics.record_started();

        Ok(RunGuard {
            run_id,
            status: Arc::clone(&self.status),
            metrics: self.metrics.clone(),
            started: Instant::now(),
            settled: false,
            _lock: lock,
        })
    }

    /// Run a pass to completion on the current task.
    pub async fn run_aggregation(&self, request: RunRequest) -> Result<RunOutcome, ApplicationError> {
        let guard = self.try_begin()?;
        self.execute(guard, request).await
    }

    /// Start a pass in the background and return its id immediately.
    pub fn trigger(self: &Arc<Self>, request: RunRequest) -> Result<RunId, ApplicationError> {
        let guard = self.try_begin()?;
        let run_id = guard.run_id();
        let orchestrator = Arc::clone(self);

        tokio::spawn(
            async move {
                // Outcome is recorded in the run status
                let _ = orchestrator.execute(guard, request).await;
            }
            .instrument(tracing::info_span!("background_aggregation", run_id = %run_id)),
        );

        Ok(run_id)
    }

    /// Run a pass holding `guard` and record its outcome.
    pub async fn execute(
        &self,
        guard: RunGuard,
        request: RunRequest,
    ) -> Result<RunOutcome, ApplicationError> {
        let started = Instant::now();
        let result = self.run_pass(guard.run_id(), &request).await;
        let elapsed = started.elapsed();

        let result = result.map(|(sequence, metrics, report)| RunOutcome {
            run_id: guard.run_id(),
            sequence,
            metrics,
            report,
            duration_ms: elapsed.as_millis() as u64,
        });
        self.finish(guard, &result, elapsed);
        result
    }

    #[instrument(skip(self, request), fields(run_id = %run_id, now = %request.now))]
    async fn run_pass(
        &self,
        run_id: RunId,
        request: &RunRequest,
    ) -> Result<(u64, MetricsSnapshot, RunReport), ApplicationError> {
        info!("Starting aggregation pass");
        let deadline = tokio::time::Instant::now() + request.deadline;

        let mut record = tokio::time::timeout_at(deadline, self.compute(run_id, request.now))
            .await
            .map_err(|_| {
                ApplicationError::Timeout(format!(
                    "Aggregation exceeded its deadline of {}ms",
                    request.deadline.as_millis()
                ))
            })??;

        if tokio::time::Instant::now() >= deadline {
            return Err(ApplicationError::Timeout(
                "Deadline expired before the snapshot write".to_string(),
            ));
        }

        // Read as late as possible so a slow pass cannot reuse a taken version
        record.sequence = self.snapshots.next_sequence().await?;

        // The write is not cancelled once started
        self.snapshots.save(&record).await?;

        Ok((record.sequence, record.metrics, record.report))
    }

    /// Everything up to, but excluding, the snapshot write.
    async fn compute(
        &self,
        run_id: RunId,
        now: DateTime<Utc>,
    ) -> Result<SnapshotRecord, ApplicationError> {
        let records = retry_with_predicate(
            self.config.fetch_retry.clone(),
            || self.events.scan_all_events(),
            ApplicationError::is_retryable,
        )
        .await?;
        let campaign = self.campaign.campaign_revenue().await?;

        let now_ts = now.timestamp();
        let mut report = RunReport {
            total_records: records.len() as u64,
            ..Default::default()
        };

        let mut events = Vec::with_capacity(records.len());
        for record in records {
            match validate(record) {
                Ok(event) if event.timestamp > now_ts => report.future_events += 1,
                Ok(event) => events.push(event),
                Err(err) => {
                    debug!(kind = err.kind(), error = %err, "Skipping invalid event record");
                    report.record_skip(err.kind());
                }
            }
        }
        report.valid_events = events.len() as u64;
        if report.skipped_records > 0 {
            warn!(
                skipped = report.skipped_records,
                by_kind = ?report.skipped_by_kind,
                "Invalid event records skipped"
            );
        }

        let groups: Vec<(String, Vec<Event>)> = group_by_customer(events).into_iter().collect();

        let engine = self.engine.clone();
        let workers = self.config.workers;
        let scored = tokio::task::spawn_blocking(move || {
            score_fleet(groups, &campaign, &engine, workers, now)
        })
        .await
        .map_err(|e| ApplicationError::Internal(format!("Aggregation task failed: {}", e)))??;

        let ScoredFleet {
            thresholds,
            customers,
            metrics,
            overflowed,
        } = scored;
        report.customers = customers.len() as u64;
        report.overflowed_customers = overflowed.len() as u64;
        if !overflowed.is_empty() {
            warn!(
                count = overflowed.len(),
                customers = ?overflowed,
                "Customers skipped: revenue exceeds the decimal range"
            );
        }

        info!(
            customers = report.customers,
            valid_events = report.valid_events,
            future_events = report.future_events,
            conversion_rate = metrics.conversion_rate,
            "Aggregation computed"
        );

        Ok(SnapshotRecord {
            run_id,
            // Assigned right before the write
            sequence: 0,
            now,
            created_at: Utc::now(),
            thresholds,
            metrics,
            customers,
            report,
        })
    }

    /// Record the outcome and release the run guard.
    fn finish(
        &self,
        mut guard: RunGuard,
        result: &Result<RunOutcome, ApplicationError>,
        elapsed: Duration,
    ) {
        let run_id = guard.run_id();
        let mut status = self.status.write();
        let target = if result.is_ok() {
            AggregationState::Succeeded
        } else {
            AggregationState::Failed
        };
        if let Err(e) = status.state.transition_to(target) {
            error!(error = %e, "Unexpected aggregation state");
            status.state = target;
        }
        status.current_run_id = None;
        status.last_run_id = Some(run_id);
        status.finished_at = Some(Utc::now());

        match result {
            Ok(outcome) => {
                status.last_error = None;
                status.last_report = Some(outcome.report.clone());
                status.last_sequence = Some(outcome.sequence);
                self.metrics
                    .record_succeeded(elapsed, outcome.report.skipped_records);
                info!(
                    run_id = %run_id,
                    sequence = outcome.sequence,
                    duration_ms = outcome.duration_ms,
                    "Aggregation pass succeeded"
                );
            }
            Err(err) => {
                status.last_error = Some(err.to_string());
                self.metrics.record_failed(elapsed);
                error!(run_id = %run_id, error = %err, "Aggregation pass failed");
            }
        }

        guard.settled = true;
        drop(status);
        drop(guard);
    }
}

/// Aggregate, score and reduce every customer group.
///
/// Customers whose revenue overflows are left out and reported; an overflow
/// of the fleet total fails the pass.
fn score_fleet(
    groups: Vec<(String, Vec<Event>)>,
    campaign: &BTreeMap<String, Decimal>,
    engine: &ScoringEngine,
    workers: usize,
    now: DateTime<Utc>,
) -> Result<ScoredFleet, ApplicationError> {
    let now_ts = now.timestamp();
    let aggregated = fan_out(groups, workers, |customer_id, events| {
        let revenue = campaign.get(customer_id).copied().unwrap_or(Decimal::ZERO);
        aggregate(customer_id, events, now_ts, revenue)
    });

    let mut summaries: BTreeMap<String, CustomerSummary> = BTreeMap::new();
    let mut overflowed = Vec::new();
    for (customer_id, result) in aggregated {
        match result {
            Ok(summary) => {
                summaries.insert(customer_id, summary);
            }
            Err(_) => overflowed.push(customer_id),
        }
    }

    let (thresholds, mut classifications) = engine.score_all(&summaries);

    let customers: BTreeMap<String, CustomerRecord> = summaries
        .into_iter()
        .filter_map(|(id, summary)| {
            let classification = classifications.remove(&id)?;
            Some((id, CustomerRecord { summary, classification }))
        })
        .collect();

    let metrics = reduce(
        customers.values().map(|c| (&c.summary, &c.classification)),
        now,
    )?;

    Ok(ScoredFleet {
        thresholds,
        customers,
        metrics,
        overflowed,
    })
}

/// Apply `f` to every group, optionally across scoped threads.
///
/// Results are keyed by group id, so the output does not depend on how work
/// was scheduled.
fn fan_out<T, R, F>(groups: Vec<(String, T)>, workers: usize, f: F) -> BTreeMap<String, R>
where
    T: Sync,
    R: Send,
    F: Fn(&str, &T) -> R + Sync,
{
    if workers <= 1 || groups.len() < 2 {
        return groups
            .iter()
            .map(|(id, item)| (id.clone(), f(id, item)))
            .collect();
    }

    let chunk_size = groups.len().div_ceil(workers);
    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = groups
            .chunks(chunk_size)
            .map(|chunk| {
                scope.spawn(move || {
                    chunk
                        .iter()
                        .map(|(id, item)| (id.clone(), f(id, item)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut results = BTreeMap::new();
        for handle in handles {
            match handle.join() {
                Ok(partial) => results.extend(partial),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        results
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fan_out_matches_sequential() {
        let groups: Vec<(String, u64)> = (0..37).map(|i| (format!("C{:03}", i), i)).collect();

        let sequential = fan_out(groups.clone(), 1, |_, v| v * 2);
        let parallel = fan_out(groups, 4, |_, v| v * 2);

        assert_eq!(sequential, parallel);
        assert_eq!(parallel.len(), 37);
        assert_eq!(parallel["C036"], 72);
    }

    #[test]
    fn test_fan_out_more_workers_than_groups() {
        let groups = vec![("a".to_string(), 1), ("b".to_string(), 2)];
        let out = fan_out(groups, 16, |id, v| format!("{}{}", id, v));
        assert_eq!(out["b"], "b2");
    }

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.default_deadline, Duration::from_secs(300));
    }
}
