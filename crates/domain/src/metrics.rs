//! Fleet-wide metrics for one aggregation pass.

use crate::customer::{RiskTier, Segment};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate metrics over all customers of a pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Reference time of the pass
    pub timestamp: DateTime<Utc>,
    pub total_customers: u64,
    pub total_sessions: u64,
    pub conversions: u64,
    /// Percentage in `[0, 100]`, two decimals
    pub conversion_rate: f64,
    /// Sum of realized revenue, not lifetime value
    pub total_revenue: Decimal,
    pub avg_cart_value: Decimal,
    pub churned_customers: u64,
    pub segment_counts: BTreeMap<Segment, u64>,
    pub risk_counts: BTreeMap<RiskTier, u64>,
}

impl MetricsSnapshot {
    /// Metrics of a pass that saw no customers.
    pub fn zero(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            total_customers: 0,
            total_sessions: 0,
            conversions: 0,
            conversion_rate: 0.0,
            total_revenue: Decimal::ZERO,
            avg_cart_value: Decimal::ZERO,
            churned_customers: 0,
            segment_counts: Segment::ALL.iter().map(|s| (*s, 0)).collect(),
            risk_counts: RiskTier::ALL.iter().map(|r| (*r, 0)).collect(),
        }
    }

    pub fn segment_count(&self, segment: Segment) -> u64 {
        self.segment_counts.get(&segment).copied().unwrap_or(0)
    }

    pub fn risk_count(&self, tier: RiskTier) -> u64 {
        self.risk_counts.get(&tier).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_snapshot_lists_every_bucket() {
        let snapshot = MetricsSnapshot::zero(Utc::now());
        assert_eq!(snapshot.segment_counts.len(), Segment::ALL.len());
        assert_eq!(snapshot.risk_counts.len(), RiskTier::ALL.len());
        assert_eq!(snapshot.segment_count(Segment::HighValueActive), 0);
        assert_eq!(snapshot.conversion_rate, 0.0);
    }

    #[test]
    fn test_segment_counts_serialize_with_snake_case_keys() {
        let snapshot = MetricsSnapshot::zero(Utc::now());
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["segment_counts"]["low_value_inactive"].is_number());
        assert!(json["risk_counts"]["medium"].is_number());
    }
}
