//! Analytics Service
//!
//! Read side of the engine plus the processing trigger. Customer and metric
//! queries are answered from the latest snapshot; customers missing from the
//! snapshot are aggregated live from their raw events.

use super::{PaginatedResult, Pagination, ServiceConfig};
use crate::aggregator::aggregate;
use crate::orchestrator::AggregationOrchestrator;
use crate::ports::{CampaignRevenueSource, EventStore};
use crate::scoring::ScoringEngine;
use crate::snapshot::SnapshotStore;
use crate::ApplicationError;
use chrono::{DateTime, Utc};
use customer_analytics_common::datetime::now_utc;
use customer_analytics_domain::{
    validate, CustomerClassification, CustomerRecord, CustomerSummary, MetricsSnapshot,
    RiskTier, RunId, RunReport, RunStatus, Segment,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where a customer view was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    /// Read from the latest snapshot
    Snapshot,
    /// Aggregated from raw events at request time
    Live,
}

/// One customer's summary and classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerView {
    pub customer_id: String,
    pub source: ViewSource,
    /// Reference time the view was computed at
    pub as_of: DateTime<Utc>,
    /// Pass that produced the view, for snapshot views
    pub run_id: Option<RunId>,
    pub summary: CustomerSummary,
    pub classification: CustomerClassification,
    /// Invalid event records left out of a live view
    #[serde(default)]
    pub skipped_records: u64,
}

/// Latest fleet metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsView {
    /// False when no pass has completed yet
    pub computed: bool,
    pub run_id: Option<RunId>,
    pub sequence: Option<u64>,
    pub metrics: MetricsSnapshot,
}

/// Filter for customer listings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerFilter {
    pub segment: Option<Segment>,
    pub risk_tier: Option<RiskTier>,
    pub churned: Option<bool>,
}

impl CustomerFilter {
    pub fn matches(&self, record: &CustomerRecord) -> bool {
        let c = &record.classification;
        self.segment.map_or(true, |s| c.segment == s)
            && self.risk_tier.map_or(true, |r| c.risk_tier == r)
            && self.churned.map_or(true, |ch| c.churned == ch)
    }
}

/// Customer listing row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerListItem {
    pub customer_id: String,
    pub segment: Segment,
    pub risk_tier: RiskTier,
    pub churned: bool,
    pub clv: Decimal,
    pub total_sessions: u64,
    pub days_since_last_transaction: Option<i64>,
}

impl From<&CustomerRecord> for CustomerListItem {
    fn from(record: &CustomerRecord) -> Self {
        Self {
            customer_id: record.summary.customer_id.clone(),
            segment: record.classification.segment,
            risk_tier: record.classification.risk_tier,
            churned: record.classification.churned,
            clv: record.classification.clv,
            total_sessions: record.summary.total_sessions,
            days_since_last_transaction: record.summary.days_since_last_transaction,
        }
    }
}

/// Overall health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// Health of one dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub checks: BTreeMap<String, ComponentCheck>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Analytics service implementation
pub struct AnalyticsService {
    orchestrator: Arc<AggregationOrchestrator>,
    events: Arc<dyn EventStore>,
    campaign: Arc<dyn CampaignRevenueSource>,
    snapshots: SnapshotStore,
    engine: ScoringEngine,
    config: ServiceConfig,
}

impl AnalyticsService {
    pub fn new(
        orchestrator: Arc<AggregationOrchestrator>,
        events: Arc<dyn EventStore>,
        campaign: Arc<dyn CampaignRevenueSource>,
        snapshots: SnapshotStore,
        config: ServiceConfig,
    ) -> Self {
        let engine = orchestrator.engine().clone();
        Self {
            orchestrator,
            events,
            campaign,
            snapshots,
            engine,
            config,
        }
    }

    pub fn orchestrator(&self) -> &Arc<AggregationOrchestrator> {
        &self.orchestrator
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Look up a customer, falling back to a live aggregation at wall-clock time.
    pub async fn get_customer(&self, customer_id: &str) -> Result<CustomerView, ApplicationError> {
        self.get_customer_at(customer_id, now_utc()).await
    }

    /// Look up a customer; a live fallback is computed as of `now`.
    #[instrument(skip(self))]
    pub async fn get_customer_at(
        &self,
        customer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CustomerView, ApplicationError> {
        let customer_id = customer_id.trim();
        if customer_id.is_empty() {
            return Err(ApplicationError::InvalidInput(
                "customer_id is required".to_string(),
            ));
        }

        let snapshot = self.snapshots.load_latest().await?;

        if let Some(snapshot) = &snapshot {
            if let Some(record) = snapshot.customer(customer_id) {
                debug!(run_id = %snapshot.run_id, "Customer served from snapshot");
                return Ok(CustomerView {
                    customer_id: customer_id.to_string(),
                    source: ViewSource::Snapshot,
                    as_of: snapshot.now,
                    run_id: Some(snapshot.run_id),
                    summary: record.summary.clone(),
                    classification: record.classification.clone(),
                    skipped_records: 0,
                });
            }
        }

        let threshold = snapshot
            .as_ref()
            .map(|s| s.thresholds.value_threshold)
            .or(self.engine.config().fixed_value_threshold);

        self.live_view(customer_id, now, threshold).await
    }

    async fn live_view(
        &self,
        customer_id: &str,
        now: DateTime<Utc>,
        threshold: Option<Decimal>,
    ) -> Result<CustomerView, ApplicationError> {
        let records = self.events.query_events(customer_id).await?;

        let mut events = Vec::with_capacity(records.len());
        let mut skipped = RunReport::default();
        for record in records {
            match validate(record) {
                Ok(event) => events.push(event),
                Err(err) => {
                    debug!(kind = err.kind(), error = %err, "Skipping invalid event record");
                    skipped.record_skip(err.kind());
                }
            }
        }
        if skipped.skipped_records > 0 {
            warn!(
                skipped = skipped.skipped_records,
                by_kind = ?skipped.skipped_by_kind,
                "Invalid event records skipped in live view"
            );
        }

        let campaign_revenue = self
            .campaign
            .campaign_revenue()
            .await?
            .remove(customer_id)
            .unwrap_or(Decimal::ZERO);

        let summary = aggregate(customer_id, &events, now.timestamp(), campaign_revenue)?;
        if summary.total_sessions == 0 {
            return Err(ApplicationError::NotFound(format!(
                "Customer {} not found",
                customer_id
            )));
        }

        // Without any threshold nobody is high value
        let classification = self
            .engine
            .score(&summary, threshold.unwrap_or(Decimal::MAX));

        info!(sessions = summary.total_sessions, "Customer aggregated live");
        Ok(CustomerView {
            customer_id: customer_id.to_string(),
            source: ViewSource::Live,
            as_of: now,
            run_id: None,
            summary,
            classification,
            skipped_records: skipped.skipped_records,
        })
    }

    /// Metrics of the latest snapshot, or zeros when nothing is computed yet.
    #[instrument(skip(self))]
    pub async fn get_metrics(&self) -> Result<MetricsView, ApplicationError> {
        match self.snapshots.load_latest().await? {
            Some(snapshot) => Ok(MetricsView {
                computed: true,
                run_id: Some(snapshot.run_id),
                sequence: Some(snapshot.sequence),
                metrics: snapshot.metrics,
            }),
            None => Ok(MetricsView {
                computed: false,
                run_id: None,
                sequence: None,
                metrics: MetricsSnapshot::zero(now_utc()),
            }),
        }
    }

    /// Start a pass in the background at wall-clock time.
    #[instrument(skip(self))]
    pub fn trigger_processing(&self) -> Result<RunId, ApplicationError> {
        if !self.config.accept_triggers {
            warn!("Aggregation trigger refused: passes run in a standalone worker");
            return Err(ApplicationError::ProcessingDisabled(
                "aggregation passes are run by a standalone worker".to_string(),
            ));
        }
        let request = self.orchestrator.default_request(now_utc());
        match self.orchestrator.trigger(request) {
            Ok(run_id) => {
                info!(run_id = %run_id, "Aggregation triggered");
                Ok(run_id)
            }
            Err(err) => {
                warn!(error = %err, "Aggregation trigger rejected");
                Err(err)
            }
        }
    }

    pub fn run_status(&self) -> RunStatus {
        self.orchestrator.status()
    }

    /// Customers of the latest snapshot matching `filter`, ordered by id.
    #[instrument(skip(self))]
    pub async fn list_customers(
        &self,
        filter: &CustomerFilter,
        pagination: Pagination,
    ) -> Result<PaginatedResult<CustomerListItem>, ApplicationError> {
        let pagination = pagination.clamped(self.config.max_page_size);

        let Some(snapshot) = self.snapshots.load_latest().await? else {
            return Ok(PaginatedResult::empty(&pagination));
        };

        let matching: Vec<&CustomerRecord> = snapshot
            .customers
            .values()
            .filter(|record| filter.matches(record))
            .collect();
        let total = matching.len() as u64;

        let items = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .map(CustomerListItem::from)
            .collect();

        Ok(PaginatedResult::new(items, total, &pagination))
    }

    /// Healthy iff both stores are reachable.
    pub async fn health(&self) -> HealthReport {
        let mut checks = BTreeMap::new();
        checks.insert(
            "event_store".to_string(),
            component(self.events.health_check().await),
        );
        checks.insert(
            "snapshot_store".to_string(),
            component(self.snapshots.health_check().await),
        );

        let status = if checks.values().all(|c| c.healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            timestamp: now_utc(),
            checks,
        }
    }
}

fn component(result: Result<(), ApplicationError>) -> ComponentCheck {
    match result {
        Ok(()) => ComponentCheck {
            healthy: true,
            message: None,
        },
        Err(err) => ComponentCheck {
            healthy: false,
            message: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use customer_analytics_domain::customer::{ActivityTier, ValueTier};

    fn record(segment: Segment, risk: RiskTier, churned: bool) -> CustomerRecord {
        CustomerRecord {
            summary: CustomerSummary::empty("C"),
            classification: CustomerClassification {
                clv: Decimal::ZERO,
                churned,
                risk_tier: risk,
                value_tier: segment.value_tier(),
                activity_tier: segment.activity_tier(),
                segment,
            },
        }
    }

    #[test]
    fn test_filter_matches() {
        let r = record(Segment::LowValueInactive, RiskTier::High, true);

        assert!(CustomerFilter::default().matches(&r));
        assert!(CustomerFilter {
            segment: Some(Segment::LowValueInactive),
            churned: Some(true),
            ..Default::default()
        }
        .matches(&r));
        assert!(!CustomerFilter {
            risk_tier: Some(RiskTier::Low),
            ..Default::default()
        }
        .matches(&r));
    }

    #[test]
    fn test_list_item_from_record() {
        let r = record(Segment::HighValueActive, RiskTier::Low, false);
        let item = CustomerListItem::from(&r);
        assert_eq!(item.segment, Segment::HighValueActive);
        assert_eq!(r.classification.value_tier, ValueTier::HighValue);
        assert_eq!(r.classification.activity_tier, ActivityTier::Active);
    }

    #[test]
    fn test_component_check() {
        assert!(component(Ok(())).healthy);
        let failed = component(Err(ApplicationError::StoreUnavailable("down".into())));
        assert!(!failed.healthy);
        assert_eq!(failed.message.as_deref(), Some("Store unavailable: down"));
    }
}
