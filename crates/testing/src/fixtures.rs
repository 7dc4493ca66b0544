//! Test fixtures: reference times, canned customer histories and a fully
//! wired engine over fake stores.

use crate::builders::EventBuilder;
use crate::mocks::{FakeBlobStore, FakeEventStore, StaticCampaignRevenue};
use chrono::{DateTime, TimeZone, Utc};
use customer_analytics_application::orchestrator::{
    AggregationOrchestrator, OrchestratorConfig, RunRequest,
};
use customer_analytics_application::scoring::ScoringEngine;
use customer_analytics_application::services::{AnalyticsService, ServiceConfig};
use customer_analytics_application::snapshot::SnapshotStore;
use customer_analytics_common::retry::RetryConfig;
use customer_analytics_domain::{EventRecord, SECONDS_PER_DAY};
use fake::faker::lorem::en::Word;
use fake::Fake;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Fixed reference time for passes: 2024-01-01T00:00:00Z
pub const REFERENCE_NOW: i64 = 1_704_067_200;

pub fn reference_now() -> DateTime<Utc> {
    Utc.timestamp_opt(REFERENCE_NOW, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Timestamp `days` whole days before [`REFERENCE_NOW`].
pub fn days_ago(days: i64) -> i64 {
    REFERENCE_NOW - days * SECONDS_PER_DAY
}

/// Customer id in the `CUST0001` format.
pub fn customer_id(n: usize) -> String {
    format!("CUST{:04}", n)
}

/// Random customer id outside the `CUSTnnnn` range used by fixtures.
pub fn random_customer_id() -> String {
    let word: String = Word().fake();
    format!("{}-{}", word, (1000..9999u32).fake::<u32>())
}

/// The reference funnel: page view, cart add and a purchase of 299.99, one
/// minute apart starting at `t0`.
pub fn cust0001_events(t0: i64) -> Vec<EventRecord> {
    let value = Decimal::new(29999, 2);
    vec![
        EventBuilder::new("CUST0001")
            .at(t0)
            .page_view()
            .session("CUST0001-S1")
            .sequence(1)
            .build(),
        EventBuilder::new("CUST0001")
            .at(t0 + 60)
            .cart_add(value)
            .session("CUST0001-S1")
            .sequence(2)
            .build(),
        EventBuilder::new("CUST0001")
            .at(t0 + 120)
            .purchase(value)
            .session("CUST0001-S1")
            .sequence(3)
            .build(),
    ]
}

/// Browse, cart and purchase events for one customer, `days` days ago.
pub fn purchase_funnel(customer_id: &str, days: i64, value: Decimal) -> Vec<EventRecord> {
    let t0 = days_ago(days);
    let session = format!("{}-D{}", customer_id, days);
    vec![
        EventBuilder::new(customer_id)
            .at(t0)
            .page_view()
            .session(session.clone())
            .build(),
        EventBuilder::new(customer_id)
            .at(t0 + 60)
            .cart_add(value)
            .session(session.clone())
            .build(),
        EventBuilder::new(customer_id)
            .at(t0 + 120)
            .purchase(value)
            .session(session)
            .build(),
    ]
}

/// Page views only, `days` days ago.
pub fn browse_only(customer_id: &str, days: i64, views: usize) -> Vec<EventRecord> {
    (0..views)
        .map(|i| {
            EventBuilder::new(customer_id)
                .at(days_ago(days) + i as i64 * 30)
                .page_view()
                .session(format!("{}-B{}", customer_id, days))
                .build()
        })
        .collect()
}

/// Assign sequence numbers in slice order, starting at 1.
pub fn with_sequences(mut records: Vec<EventRecord>) -> Vec<EventRecord> {
    for (i, record) in records.iter_mut().enumerate() {
        record.sequence = i as u64 + 1;
    }
    records
}

/// A fleet with exact totals.
///
/// Events are dealt round-robin over `customers` ids, so every customer has
/// an event when `sessions >= customers`. The first `conversions` events are
/// purchases of 50.00; the rest are page views. All events fall within the
/// last 60 days.
pub fn fleet(customers: usize, sessions: usize, conversions: usize) -> Vec<EventRecord> {
    let customers = customers.max(1);
    let records = (0..sessions)
        .map(|i| {
            let id = customer_id(i % customers + 1);
            let round = i / customers;
            let builder = EventBuilder::new(id.clone())
                .at(days_ago((i % 60) as i64 + 1) + round as i64)
                .session(format!("{}-S{}", id, round));
            if i < conversions {
                builder.purchase(Decimal::new(5000, 2)).build()
            } else {
                builder.page_view().build()
            }
        })
        .collect();
    with_sequences(records)
}

/// Orchestrator settings for tests: tiny backoff, default deadline.
pub fn test_orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        default_deadline: Duration::from_secs(30),
        workers: 1,
        fetch_retry: RetryConfig::exponential(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5)),
    }
}

/// Engine wired over fake stores
pub struct TestHarness {
    pub events: Arc<FakeEventStore>,
    pub blobs: Arc<FakeBlobStore>,
    pub snapshots: SnapshotStore,
    pub orchestrator: Arc<AggregationOrchestrator>,
    pub service: AnalyticsService,
}

impl TestHarness {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self::with_options(
            records,
            StaticCampaignRevenue::new(),
            ScoringEngine::default(),
            test_orchestrator_config(),
        )
    }

    pub fn with_options(
        records: Vec<EventRecord>,
        campaign: StaticCampaignRevenue,
        engine: ScoringEngine,
        config: OrchestratorConfig,
    ) -> Self {
        let events = FakeEventStore::with_records(records).shared();
        let blobs = FakeBlobStore::new().shared();
        let campaign = Arc::new(campaign);
        let snapshots = SnapshotStore::new(blobs.clone());

        let orchestrator = Arc::new(AggregationOrchestrator::new(
            events.clone(),
            campaign.clone(),
            snapshots.clone(),
            engine,
            config,
        ));
        let service = AnalyticsService::new(
            orchestrator.clone(),
            events.clone(),
            campaign,
            snapshots.clone(),
            ServiceConfig::default(),
        );

        Self {
            events,
            blobs,
            snapshots,
            orchestrator,
            service,
        }
    }

    /// Request at [`REFERENCE_NOW`] with a generous deadline.
    pub fn request(&self) -> RunRequest {
        RunRequest::new(reference_now(), Duration::from_secs(30))
    }
}
