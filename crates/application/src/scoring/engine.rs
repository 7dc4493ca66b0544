//! Scoring Engine - Customer classification logic
//!
//! Scoring is two-phase. The value threshold is computed first from the
//! lifetime values of every customer in the pass, then each customer is
//! classified against it. Classification never fails.

use customer_analytics_common::config::ScoringSettings;
use customer_analytics_domain::customer::{
    ActivityTier, CustomerClassification, CustomerSummary, RiskTier, Segment, ValueTier,
};
use customer_analytics_domain::snapshot::{ScoringThresholds, ThresholdSource};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Scoring engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Days without a purchase after which a customer counts as churned
    pub churn_window_days: i64,
    /// Days without a purchase after which risk is high
    pub high_risk_days: i64,
    /// Percentile (0, 1] of lifetime values used as the high-value cutoff
    pub value_percentile: f64,
    /// Fixed cutoff replacing the percentile
    pub fixed_value_threshold: Option<Decimal>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            churn_window_days: 90,
            high_risk_days: 180,
            value_percentile: 0.8,
            fixed_value_threshold: None,
        }
    }
}

impl From<&ScoringSettings> for ScoringConfig {
    fn from(settings: &ScoringSettings) -> Self {
        Self {
            churn_window_days: settings.churn_window_days,
            high_risk_days: settings.high_risk_days,
            value_percentile: settings.value_percentile,
            fixed_value_threshold: settings.fixed_value_threshold,
        }
    }
}

/// The customer scoring engine
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// High-value cutoff for a pass over the given lifetime values.
    ///
    /// Uses the configured fixed threshold when present, otherwise the
    /// nearest-rank percentile. An empty pass has a zero threshold.
    pub fn value_threshold(&self, clvs: &[Decimal]) -> (Decimal, ThresholdSource) {
        match self.config.fixed_value_threshold {
            Some(fixed) => (fixed, ThresholdSource::Fixed),
            None => (
                nearest_rank_percentile(clvs, self.config.value_percentile),
                ThresholdSource::Percentile,
            ),
        }
    }

    /// Thresholds record for a pass that used `value_threshold`.
    pub fn thresholds(&self, value_threshold: Decimal, source: ThresholdSource) -> ScoringThresholds {
        ScoringThresholds {
            churn_window_days: self.config.churn_window_days,
            high_risk_days: self.config.high_risk_days,
            value_percentile: self.config.value_percentile,
            value_threshold,
            value_threshold_source: source,
        }
    }

    /// A customer is churned when the last purchase is older than the churn
    /// window. Customers who never purchased are churned.
    pub fn is_churned(&self, days_since_last_transaction: Option<i64>) -> bool {
        match days_since_last_transaction {
            Some(days) => days > self.config.churn_window_days,
            None => true,
        }
    }

    /// Risk tier of a summary. Boundaries belong to the lower tier.
    pub fn risk_tier(&self, summary: &CustomerSummary) -> RiskTier {
        if summary.converted_count == 0 {
            return RiskTier::High;
        }

        match summary.days_since_last_transaction {
            None => RiskTier::High,
            Some(days) if days > self.config.high_risk_days => RiskTier::High,
            Some(days) if days > self.config.churn_window_days => RiskTier::Medium,
            Some(_) => RiskTier::Low,
        }
    }

    /// Classify one customer against a precomputed value threshold.
    pub fn score(&self, summary: &CustomerSummary, value_threshold: Decimal) -> CustomerClassification {
        let clv = summary.clv();
        let churned = self.is_churned(summary.days_since_last_transaction);

        let value_tier = if clv > value_threshold {
            ValueTier::HighValue
        } else {
            ValueTier::LowValue
        };
        let activity_tier = if churned {
            ActivityTier::Inactive
        } else {
            ActivityTier::Active
        };

        CustomerClassification {
            clv,
            churned,
            risk_tier: self.risk_tier(summary),
            value_tier,
            activity_tier,
            segment: Segment::from_tiers(value_tier, activity_tier),
        }
    }

    /// Score every customer of a pass.
    #[instrument(skip(self, summaries), fields(customers = summaries.len()))]
    pub fn score_all(
        &self,
        summaries: &BTreeMap<String, CustomerSummary>,
    ) -> (ScoringThresholds, BTreeMap<String, CustomerClassification>) {
        let clvs: Vec<Decimal> = summaries.values().map(CustomerSummary::clv).collect();
        let (threshold, source) = self.value_threshold(&clvs);

        let classifications = summaries
            .iter()
            .map(|(id, summary)| (id.clone(), self.score(summary, threshold)))
            .collect();

        debug!(value_threshold = %threshold, source = ?source, "Scoring complete");
        (self.thresholds(threshold, source), classifications)
    }
}

/// Nearest-rank percentile: the smallest value such that at least `p` of
/// the values are less than or equal to it.
pub fn nearest_rank_percentile(values: &[Decimal], p: f64) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }

    let mut sorted = values.to_vec();
    sorted.sort_unstable();

    let n = sorted.len();
    let p = Decimal::from_f64(p.clamp(0.0, 1.0)).unwrap_or(Decimal::ONE);
    let rank = (p * Decimal::from(n)).ceil().to_usize().unwrap_or(n);
    let idx = rank.clamp(1, n) - 1;

    sorted[idx]
}

/// Builder for ScoringEngine
pub struct ScoringEngineBuilder {
    config: ScoringConfig,
}

impl ScoringEngineBuilder {
    pub fn new() -> Self {
        Self {
            config: ScoringConfig::default(),
        }
    }

    pub fn config(mut self, config: ScoringConfig) -> Self {
        self.config = config;
        self
    }

    pub fn churn_window_days(mut self, days: i64) -> Self {
        self.config.churn_window_days = days;
        self
    }

    pub fn high_risk_days(mut self, days: i64) -> Self {
        self.config.high_risk_days = days;
        self
    }

    pub fn value_percentile(mut self, percentile: f64) -> Self {
        self.config.value_percentile = percentile;
        self
    }

    pub fn fixed_value_threshold(mut self, threshold: Decimal) -> Self {
        self.config.fixed_value_threshold = Some(threshold);
        self
    }

    pub fn build(self) -> ScoringEngine {
        ScoringEngine::new(self.config)
    }
}

impl Default for ScoringEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
