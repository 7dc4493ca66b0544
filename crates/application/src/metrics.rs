//! Aggregation run counters

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Durations kept for averages
const DURATION_WINDOW: usize = 500;

/// Counters of aggregation passes, shared by the orchestrator and reporters.
#[derive(Clone, Default)]
pub struct RunMetrics {
    inner: Arc<RwLock<MetricsInner>>,
}

#[derive(Default)]
struct MetricsInner {
    runs_started: u64,
    runs_succeeded: u64,
    runs_failed: u64,
    /// Triggers refused because a pass was already running
    runs_rejected: u64,
    /// Records skipped by validation across all passes
    records_skipped: u64,
    durations: Vec<Duration>,
    last_duration: Option<Duration>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_started(&self) {
        self.inner.write().runs_started += 1;
    }

    pub fn record_succeeded(&self, duration: Duration, skipped_records: u64) {
        let mut inner = self.inner.write();
        inner.runs_succeeded += 1;
        inner.records_skipped += skipped_records;
        Self::push_duration(&mut inner, duration);
    }

    pub fn record_failed(&self, duration: Duration) {
        let mut inner = self.inner.write();
        inner.runs_failed += 1;
        Self::push_duration(&mut inner, duration);
    }

    pub fn record_rejected(&self) {
        self.inner.write().runs_rejected += 1;
    }

    fn push_duration(inner: &mut MetricsInner, duration: Duration) {
        inner.last_duration = Some(duration);
        inner.durations.push(duration);
        if inner.durations.len() > DURATION_WINDOW {
            let excess = inner.durations.len() - DURATION_WINDOW;
            inner.durations.drain(0..excess);
        }
    }

    pub fn runs_started(&self) -> u64 {
        self.inner.read().runs_started
    }

    pub fn runs_succeeded(&self) -> u64 {
        self.inner.read().runs_succeeded
    }

    pub fn runs_failed(&self) -> u64 {
        self.inner.read().runs_failed
    }

    pub fn runs_rejected(&self) -> u64 {
        self.inner.read().runs_rejected
    }

    /// Get metrics snapshot
    pub fn snapshot(&self) -> RunMetricsSnapshot {
        let inner = self.inner.read();
        let finished = inner.runs_succeeded + inner.runs_failed;
        let average = if inner.durations.is_empty() {
            None
        } else {
            let total: Duration = inner.durations.iter().sum();
            Some(total / inner.durations.len() as u32)
        };

        RunMetricsSnapshot {
            runs_started: inner.runs_started,
            runs_succeeded: inner.runs_succeeded,
            runs_failed: inner.runs_failed,
            runs_rejected: inner.runs_rejected,
            records_skipped: inner.records_skipped,
            success_rate: if finished == 0 {
                0.0
            } else {
                inner.runs_succeeded as f64 / finished as f64
            },
            average_duration_ms: average.map(|d| d.as_millis() as u64),
            last_duration_ms: inner.last_duration.map(|d| d.as_millis() as u64),
        }
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetricsSnapshot {
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub runs_rejected: u64,
    pub records_skipped: u64,
    pub success_rate: f64,
    pub average_duration_ms: Option<u64>,
    pub last_duration_ms: Option<u64>,
}

impl RunMetricsSnapshot {
    /// Format metrics for display
    pub fn format(&self) -> String {
        format!(
            "Aggregation runs: started={} succeeded={} failed={} rejected={} \
             success_rate={:.2}% avg_duration={} last_duration={} skipped_records={}",
            self.runs_started,
            self.runs_succeeded,
            self.runs_failed,
            self.runs_rejected,
            self.success_rate * 100.0,
            format_millis(self.average_duration_ms),
            format_millis(self.last_duration_ms),
            self.records_skipped,
        )
    }
}

fn format_millis(ms: Option<u64>) -> String {
    match ms {
        Some(ms) => format!("{}ms", ms),
        None => "N/A".to_string(),
    }
}
