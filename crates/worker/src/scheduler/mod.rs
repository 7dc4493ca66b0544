//! Scheduled aggregation passes

mod schedule;

pub use schedule::{CronField, Schedule};

use anyhow::Result;
use chrono::{DateTime, Utc};
use customer_analytics_application::{AggregationOrchestrator, ApplicationError};
use customer_analytics_common::config::SchedulerSettings;
use customer_analytics_domain::RunId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// What a scheduler tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The schedule does not match, or already fired this minute
    Idle,
    /// A pass was started
    Triggered(RunId),
    /// The schedule matched while another pass was running
    Skipped { active_run: Option<RunId> },
    /// The trigger was refused for another reason
    Failed(String),
}

/// Starts aggregation passes when the schedule matches.
///
/// Fires at most once per matching minute. A tick that matches while a pass
/// is still running is skipped, not queued.
pub struct AggregationScheduler {
    orchestrator: Arc<AggregationOrchestrator>,
    schedule: Schedule,
    tick_interval: Duration,
    /// Minute (unix seconds / 60) of the last firing
    last_fired: Option<i64>,
}

impl AggregationScheduler {
    pub fn new(orchestrator: Arc<AggregationOrchestrator>, settings: &SchedulerSettings) -> Result<Self> {
        let schedule = Schedule::parse(&settings.cron)?;
        Ok(Self::with_schedule(
            orchestrator,
            schedule,
            Duration::from_secs(settings.tick_interval_seconds.max(1)),
        ))
    }

    pub fn with_schedule(
        orchestrator: Arc<AggregationOrchestrator>,
        schedule: Schedule,
        tick_interval: Duration,
    ) -> Self {
        Self {
            orchestrator,
            schedule,
            tick_interval,
            last_fired: None,
        }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Evaluate the schedule at `now` and trigger a pass if it is due.
    ///
    /// Must be called inside a Tokio runtime; passes run on spawned tasks.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.schedule.matches(&now) {
            return TickOutcome::Idle;
        }

        let minute = now.timestamp().div_euclid(60);
        if self.last_fired == Some(minute) {
            return TickOutcome::Idle;
        }
        self.last_fired = Some(minute);

        if self.orchestrator.is_running() {
            let active_run = self.orchestrator.status().current_run_id;
            info!(active_run = ?active_run, "Scheduled pass skipped, a pass is already running");
            return TickOutcome::Skipped { active_run };
        }

        let request = self.orchestrator.default_request(now);
        match self.orchestrator.trigger(request) {
            Ok(run_id) => {
                info!(run_id = %run_id, schedule = %self.schedule, "Scheduled aggregation pass started");
                TickOutcome::Triggered(run_id)
            }
            Err(ApplicationError::AlreadyRunning { run_id }) => {
                info!(active_run = %run_id, "Scheduled pass skipped, a pass is already running");
                TickOutcome::Skipped {
                    active_run: Some(run_id),
                }
            }
            Err(e) => {
                error!(error = %e, "Failed to start scheduled aggregation pass");
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    /// Start the scheduler loop; it stops when `shutdown` receives or closes.
    pub fn start(mut self, mut shutdown: mpsc::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                schedule = %self.schedule,
                tick_interval_secs = self.tick_interval.as_secs(),
                "Starting aggregation scheduler"
            );

            let mut interval = tokio::time::interval(self.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let outcome = self.tick(Utc::now());
                        if let TickOutcome::Failed(ref reason) = outcome {
                            warn!(reason = %reason, "Scheduler tick failed");
                        } else {
                            debug!(outcome = ?outcome, "Scheduler tick");
                        }
                    }
                    _ = shutdown.recv() => {
                        info!("Aggregation scheduler stopped");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use customer_analytics_testing::TestHarness;

    fn at(hour: u32, minute: u32, second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, hour, minute, second).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_fires_once_per_matching_minute() {
        let harness = TestHarness::new(Vec::new());
        let mut scheduler = AggregationScheduler::with_schedule(
            harness.orchestrator.clone(),
            Schedule::hourly(0),
            Duration::from_secs(30),
        );

        assert_eq!(scheduler.tick(at(1, 59, 30)), TickOutcome::Idle);
        assert!(matches!(scheduler.tick(at(2, 0, 0)), TickOutcome::Triggered(_)));
        assert_eq!(scheduler.tick(at(2, 0, 30)), TickOutcome::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_skips_while_a_pass_is_running() {
        let harness = TestHarness::new(Vec::new());
        harness.events.set_scan_delay(Some(Duration::from_secs(600)));
        let orchestrator = harness.orchestrator.clone();
        let mut scheduler = AggregationScheduler::with_schedule(
            orchestrator.clone(),
            Schedule::every_minute(),
            Duration::from_secs(30),
        );

        let first = match scheduler.tick(at(2, 0, 0)) {
            TickOutcome::Triggered(run_id) => run_id,
            other => panic!("expected a triggered pass, got {:?}", other),
        };
        assert!(orchestrator.is_running());

        assert_eq!(
            scheduler.tick(at(2, 1, 0)),
            TickOutcome::Skipped {
                active_run: Some(first)
            }
        );
        assert_eq!(orchestrator.metrics().runs_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_on_shutdown() {
        let harness = TestHarness::new(Vec::new());
        let scheduler = AggregationScheduler::with_schedule(
            harness.orchestrator.clone(),
            Schedule::parse("0 0 1 1 *").unwrap(),
            Duration::from_secs(30),
        );
        let (tx, rx) = mpsc::channel(1);

        let handle = scheduler.start(rx);
        tx.send(()).await.unwrap();

        handle.await.unwrap();
    }

    #[test]
    fn test_new_rejects_invalid_cron() {
        let harness = TestHarness::new(Vec::new());
        let settings = SchedulerSettings {
            cron: "every hour".to_string(),
            ..Default::default()
        };
        assert!(AggregationScheduler::new(harness.orchestrator.clone(), &settings).is_err());
    }
}
