//! Per-customer summaries and classifications.

use crate::event::Event;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Everything the engine knows about one customer for one pass.
///
/// Summaries are rebuilt from the event history on every pass and are never
/// updated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: String,
    /// Events in chronological order
    pub sessions: Vec<Event>,
    /// Number of events
    pub total_sessions: u64,
    /// Number of distinct session ids
    pub distinct_sessions: u64,
    pub last_event_timestamp: Option<i64>,
    pub last_purchase_timestamp: Option<i64>,
    /// Whole days since the latest purchase; `None` when the customer never purchased
    pub days_since_last_transaction: Option<i64>,
    /// Sum of cart values over converted events
    pub actual_revenue: Decimal,
    /// Externally attributed revenue, zero when not supplied
    pub campaign_revenue: Decimal,
    pub converted_count: u64,
}

impl CustomerSummary {
    /// Summary of a customer with no history.
    pub fn empty(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            sessions: Vec::new(),
            total_sessions: 0,
            distinct_sessions: 0,
            last_event_timestamp: None,
            last_purchase_timestamp: None,
            days_since_last_transaction: None,
            actual_revenue: Decimal::ZERO,
            campaign_revenue: Decimal::ZERO,
            converted_count: 0,
        }
    }

    /// Customer lifetime value, `None` when it does not fit in a `Decimal`.
    pub fn checked_clv(&self) -> Option<Decimal> {
        self.actual_revenue.checked_add(self.campaign_revenue)
    }

    /// Customer lifetime value, saturating at `Decimal::MAX`.
    ///
    /// Summaries built by the aggregator always have a representable value.
    pub fn clv(&self) -> Decimal {
        self.checked_clv().unwrap_or(Decimal::MAX)
    }

    pub fn has_purchased(&self) -> bool {
        self.last_purchase_timestamp.is_some()
    }
}

/// Churn risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub const ALL: [RiskTier; 3] = [Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Value bucket relative to the pass's value threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueTier {
    LowValue,
    HighValue,
}

impl ValueTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowValue => "low_value",
            Self::HighValue => "high_value",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityTier {
    Active,
    Inactive,
}

impl ActivityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

/// Value tier crossed with activity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    HighValueActive,
    HighValueInactive,
    LowValueActive,
    LowValueInactive,
}

impl Segment {
    pub const ALL: [Segment; 4] = [
        Self::HighValueActive,
        Self::HighValueInactive,
        Self::LowValueActive,
        Self::LowValueInactive,
    ];

    pub fn from_tiers(value: ValueTier, activity: ActivityTier) -> Self {
        match (value, activity) {
            (ValueTier::HighValue, ActivityTier::Active) => Self::HighValueActive,
            (ValueTier::HighValue, ActivityTier::Inactive) => Self::HighValueInactive,
            (ValueTier::LowValue, ActivityTier::Active) => Self::LowValueActive,
            (ValueTier::LowValue, ActivityTier::Inactive) => Self::LowValueInactive,
        }
    }

    pub fn value_tier(&self) -> ValueTier {
        match self {
            Self::HighValueActive | Self::HighValueInactive => ValueTier::HighValue,
            Self::LowValueActive | Self::LowValueInactive => ValueTier::LowValue,
        }
    }

    pub fn activity_tier(&self) -> ActivityTier {
        match self {
            Self::HighValueActive | Self::LowValueActive => ActivityTier::Active,
            Self::HighValueInactive | Self::LowValueInactive => ActivityTier::Inactive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HighValueActive => "high_value_active",
            Self::HighValueInactive => "high_value_inactive",
            Self::LowValueActive => "low_value_active",
            Self::LowValueInactive => "low_value_inactive",
        }
    }
}

macro_rules! impl_str_conversions {
    ($ty:ident, $label:expr) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                serde_json::from_value(serde_json::Value::String(s.to_ascii_lowercase()))
                    .map_err(|_| format!("invalid {}: {}", $label, s))
            }
        }
    };
}

impl_str_conversions!(RiskTier, "risk tier");
impl_str_conversions!(ValueTier, "value tier");
impl_str_conversions!(ActivityTier, "activity tier");
impl_str_conversions!(Segment, "segment");

/// Derived classification of one customer for one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerClassification {
    pub clv: Decimal,
    pub churned: bool,
    pub risk_tier: RiskTier,
    pub value_tier: ValueTier,
    pub activity_tier: ActivityTier,
    pub segment: Segment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_round_trips_tiers() {
        for segment in Segment::ALL {
            assert_eq!(
                Segment::from_tiers(segment.value_tier(), segment.activity_tier()),
                segment
            );
        }
    }

    #[test]
    fn test_parse_from_query_strings() {
        assert_eq!("high".parse::<RiskTier>().unwrap(), RiskTier::High);
        assert_eq!(
            "LOW_VALUE_ACTIVE".parse::<Segment>().unwrap(),
            Segment::LowValueActive
        );
        assert!("vip".parse::<Segment>().is_err());
    }

    #[test]
    fn test_empty_summary_has_zero_clv() {
        let summary = CustomerSummary::empty("CUST0001");
        assert_eq!(summary.clv(), Decimal::ZERO);
        assert!(!summary.has_purchased());
    }

    #[test]
    fn test_clv_beyond_decimal_range() {
        let mut summary = CustomerSummary::empty("CUST0001");
        summary.actual_revenue = Decimal::MAX;
        summary.campaign_revenue = Decimal::ONE;

        assert_eq!(summary.checked_clv(), None);
        assert_eq!(summary.clv(), Decimal::MAX);
    }
}
