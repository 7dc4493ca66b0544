//! Metrics Reducer
//!
//! Fleet-wide metrics are a commutative, associative fold over
//! [`MetricsAccumulator`], so partitions of the customer set can be reduced
//! independently and merged in any order.

use chrono::{DateTime, Utc};
use customer_analytics_domain::customer::{CustomerClassification, CustomerSummary, RiskTier, Segment};
use customer_analytics_domain::{MetricsSnapshot, RevenueOverflow};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;

/// Running totals over a set of customers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsAccumulator {
    pub total_customers: u64,
    pub total_sessions: u64,
    pub conversions: u64,
    pub total_revenue: Decimal,
    pub churned_customers: u64,
    pub segment_counts: BTreeMap<Segment, u64>,
    pub risk_counts: BTreeMap<RiskTier, u64>,
}

impl MetricsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one customer. The accumulator is unchanged when revenue overflows.
    pub fn add(
        &mut self,
        summary: &CustomerSummary,
        classification: &CustomerClassification,
    ) -> Result<(), RevenueOverflow> {
        self.total_revenue = self
            .total_revenue
            .checked_add(summary.actual_revenue)
            .ok_or_else(RevenueOverflow::fleet)?;
        self.total_customers += 1;
        self.total_sessions += summary.total_sessions;
        self.conversions += summary.converted_count;
        if classification.churned {
            self.churned_customers += 1;
        }
        *self.segment_counts.entry(classification.segment).or_insert(0) += 1;
        *self.risk_counts.entry(classification.risk_tier).or_insert(0) += 1;
        Ok(())
    }

    /// Combine two partial accumulations.
    pub fn merge(mut self, other: MetricsAccumulator) -> Result<Self, RevenueOverflow> {
        self.total_revenue = self
            .total_revenue
            .checked_add(other.total_revenue)
            .ok_or_else(RevenueOverflow::fleet)?;
        self.total_customers += other.total_customers;
        self.total_sessions += other.total_sessions;
        self.conversions += other.conversions;
        self.churned_customers += other.churned_customers;
        for (segment, count) in other.segment_counts {
            *self.segment_counts.entry(segment).or_insert(0) += count;
        }
        for (tier, count) in other.risk_counts {
            *self.risk_counts.entry(tier).or_insert(0) += count;
        }
        Ok(self)
    }

    /// Conversion rate in percent, two decimals. Zero without sessions.
    pub fn conversion_rate(&self) -> f64 {
        if self.total_sessions == 0 {
            return 0.0;
        }
        let rate = Decimal::from(self.conversions) / Decimal::from(self.total_sessions)
            * Decimal::ONE_HUNDRED;
        round2(rate).to_f64().unwrap_or(0.0)
    }

    /// Average realized revenue per conversion, two decimals. Zero without conversions.
    pub fn avg_cart_value(&self) -> Decimal {
        if self.conversions == 0 {
            return Decimal::ZERO;
        }
        round2(self.total_revenue / Decimal::from(self.conversions))
    }

    /// Produce the snapshot for a pass at `timestamp`.
    pub fn finish(self, timestamp: DateTime<Utc>) -> MetricsSnapshot {
        let conversion_rate = self.conversion_rate();
        let avg_cart_value = self.avg_cart_value();

        let mut snapshot = MetricsSnapshot::zero(timestamp);
        snapshot.total_customers = self.total_customers;
        snapshot.total_sessions = self.total_sessions;
        snapshot.conversions = self.conversions;
        snapshot.conversion_rate = conversion_rate;
        snapshot.total_revenue = self.total_revenue;
        snapshot.avg_cart_value = avg_cart_value;
        snapshot.churned_customers = self.churned_customers;
        snapshot.segment_counts.extend(self.segment_counts);
        snapshot.risk_counts.extend(self.risk_counts);
        snapshot
    }
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Reduce classified customers into fleet metrics.
///
/// Fails when the fleet's realized revenue does not fit in a `Decimal`.
pub fn reduce<'a, I>(customers: I, timestamp: DateTime<Utc>) -> Result<MetricsSnapshot, RevenueOverflow>
where
    I: IntoIterator<Item = (&'a CustomerSummary, &'a CustomerClassification)>,
{
    let mut acc = MetricsAccumulator::new();
    for (summary, classification) in customers {
        acc.add(summary, classification)?;
    }
    Ok(acc.finish(timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use customer_analytics_domain::customer::{ActivityTier, ValueTier};

    fn accumulator(sessions: u64, conversions: u64, revenue: Decimal) -> MetricsAccumulator {
        MetricsAccumulator {
            total_customers: 1,
            total_sessions: sessions,
            conversions,
            total_revenue: revenue,
            ..Default::default()
        }
    }

    #[test]
    fn test_conversion_rate_rounding() {
        let acc = accumulator(1247, 189, Decimal::ZERO);
        assert_eq!(acc.conversion_rate(), 15.16);
    }

    #[test]
    fn test_zero_guards() {
        let acc = MetricsAccumulator::new();
        assert_eq!(acc.conversion_rate(), 0.0);
        assert_eq!(acc.avg_cart_value(), Decimal::ZERO);

        let no_conversions = accumulator(10, 0, Decimal::ZERO);
        assert_eq!(no_conversions.conversion_rate(), 0.0);
        assert_eq!(no_conversions.avg_cart_value(), Decimal::ZERO);
    }

    #[test]
    fn test_avg_cart_value() {
        let acc = accumulator(10, 3, Decimal::new(10000, 2));
        assert_eq!(acc.avg_cart_value(), Decimal::new(3333, 2));
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut a = accumulator(5, 1, Decimal::new(1999, 2));
        a.segment_counts.insert(Segment::HighValueActive, 1);
        let mut b = accumulator(7, 2, Decimal::new(501, 2));
        b.segment_counts.insert(Segment::LowValueInactive, 1);
        b.risk_counts.insert(RiskTier::High, 1);
        let c = accumulator(3, 0, Decimal::ZERO);

        let left = a.clone().merge(b.clone()).unwrap().merge(c.clone()).unwrap();
        let right = c.merge(b).unwrap().merge(a).unwrap();
        assert_eq!(left, right);
        assert_eq!(left.total_sessions, 15);
        assert_eq!(left.total_revenue, Decimal::new(2500, 2));
    }

    #[test]
    fn test_reduce_counts_segments_and_churn() {
        let mut s1 = CustomerSummary::empty("A");
        s1.total_sessions = 4;
        s1.converted_count = 1;
        s1.actual_revenue = Decimal::new(5000, 2);
        s1.campaign_revenue = Decimal::new(9900, 2);
        let c1 = CustomerClassification {
            clv: s1.clv(),
            churned: false,
            risk_tier: RiskTier::Low,
            value_tier: ValueTier::HighValue,
            activity_tier: ActivityTier::Active,
            segment: Segment::HighValueActive,
        };
        let s2 = CustomerSummary::empty("B");
        let c2 = CustomerClassification {
            clv: Decimal::ZERO,
            churned: true,
            risk_tier: RiskTier::High,
            value_tier: ValueTier::LowValue,
            activity_tier: ActivityTier::Inactive,
            segment: Segment::LowValueInactive,
        };

        let snapshot = reduce([(&s1, &c1), (&s2, &c2)], Utc::now()).unwrap();

        assert_eq!(snapshot.total_customers, 2);
        assert_eq!(snapshot.churned_customers, 1);
        // Realized revenue only, campaign revenue excluded
        assert_eq!(snapshot.total_revenue, Decimal::new(5000, 2));
        assert_eq!(snapshot.conversion_rate, 25.0);
        assert_eq!(snapshot.segment_count(Segment::HighValueActive), 1);
        assert_eq!(snapshot.segment_count(Segment::HighValueInactive), 0);
        assert_eq!(snapshot.risk_count(RiskTier::High), 1);
        let segment_total: u64 = snapshot.segment_counts.values().sum();
        assert_eq!(segment_total, snapshot.total_customers);
    }

    #[test]
    fn test_fleet_revenue_overflow() {
        let big = accumulator(1, 1, Decimal::MAX);

        assert_eq!(
            big.clone().merge(big.clone()).unwrap_err(),
            RevenueOverflow::fleet()
        );

        let mut summary = CustomerSummary::empty("A");
        summary.actual_revenue = Decimal::MAX;
        let classification = CustomerClassification {
            clv: Decimal::MAX,
            churned: false,
            risk_tier: RiskTier::Low,
            value_tier: ValueTier::HighValue,
            activity_tier: ActivityTier::Active,
            segment: Segment::HighValueActive,
        };
        let result = reduce([(&summary, &classification), (&summary, &classification)], Utc::now());
        assert_eq!(result.unwrap_err(), RevenueOverflow::fleet());

        let mut acc = MetricsAccumulator::new();
        acc.add(&summary, &classification).unwrap();
        assert!(acc.add(&summary, &classification).is_err());
        assert_eq!(acc.total_customers, 1);
    }
}
