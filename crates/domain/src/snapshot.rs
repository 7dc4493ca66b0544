//! Persisted result of an aggregation pass.

use crate::customer::{CustomerClassification, CustomerSummary};
use crate::identifiers::RunId;
use crate::metrics::MetricsSnapshot;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where the value threshold of a pass came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSource {
    /// Nearest-rank percentile of all lifetime values in the pass
    Percentile,
    /// Configured fixed override
    Fixed,
}

/// Scoring cutoffs actually applied in a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringThresholds {
    pub churn_window_days: i64,
    pub high_risk_days: i64,
    pub value_percentile: f64,
    pub value_threshold: Decimal,
    pub value_threshold_source: ThresholdSource,
}

/// Validation and filtering counters of a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Records returned by the event store
    pub total_records: u64,
    /// Records that passed validation and were not in the future
    pub valid_events: u64,
    /// Records rejected by validation
    pub skipped_records: u64,
    /// Rejections keyed by validation error kind
    pub skipped_by_kind: BTreeMap<String, u64>,
    /// Valid events later than the pass's reference time
    pub future_events: u64,
    /// Customers included in the snapshot
    pub customers: u64,
    /// Customers left out because their revenue exceeds the decimal range
    #[serde(default)]
    pub overflowed_customers: u64,
}

impl RunReport {
    pub fn record_skip(&mut self, kind: &str) {
        self.skipped_records += 1;
        *self.skipped_by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }
}

/// Summary and classification of one customer as stored in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub summary: CustomerSummary,
    pub classification: CustomerClassification,
}

/// Versioned record of one completed pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub run_id: RunId,
    /// Monotonic snapshot version
    pub sequence: u64,
    /// Reference time of the pass
    pub now: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub thresholds: ScoringThresholds,
    pub metrics: MetricsSnapshot,
    pub customers: BTreeMap<String, CustomerRecord>,
    pub report: RunReport,
}

impl SnapshotRecord {
    pub fn customer(&self, customer_id: &str) -> Option<&CustomerRecord> {
        self.customers.get(customer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_skip_counts_by_kind() {
        let mut report = RunReport::default();
        report.record_skip("negative_cart_value");
        report.record_skip("negative_cart_value");
        report.record_skip("empty_customer_id");

        assert_eq!(report.skipped_records, 3);
        assert_eq!(report.skipped_by_kind["negative_cart_value"], 2);
        assert_eq!(report.skipped_by_kind["empty_customer_id"], 1);
    }
}
