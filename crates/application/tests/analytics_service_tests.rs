//! Tests for the analytics query service
//!
//! Tests snapshot lookups, the live fallback, metrics, listing, triggers and
//! health.

use customer_analytics_application::services::{
    CustomerFilter, HealthStatus, Pagination, ViewSource,
};
use customer_analytics_application::{AnalyticsService, ApplicationError, ServiceConfig};
use customer_analytics_domain::{EventRecord, RiskTier, Segment, ValueTier};
use customer_analytics_testing::{
    browse_only, cust0001_events, days_ago, purchase_funnel, reference_now, with_sequences,
    EventBuilder, StaticCampaignRevenue, TestHarness,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn fleet() -> Vec<EventRecord> {
    let mut records = Vec::new();
    records.extend(purchase_funnel("CUST0001", 5, Decimal::new(90000, 2)));
    records.extend(purchase_funnel("CUST0002", 10, Decimal::new(1000, 2)));
    records.extend(purchase_funnel("CUST0003", 150, Decimal::new(2000, 2)));
    records.extend(purchase_funnel("CUST0004", 30, Decimal::new(3000, 2)));
    records.extend(browse_only("CUST0005", 2, 4));
    with_sequences(records)
}

#[tokio::test]
async fn test_get_customer_from_snapshot() {
    let harness = TestHarness::new(fleet());
    let outcome = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    let view = harness.service.get_customer("CUST0001").await.unwrap();

    assert_eq!(view.source, ViewSource::Snapshot);
    assert_eq!(view.run_id, Some(outcome.run_id));
    assert_eq!(view.as_of, reference_now());
    assert_eq!(view.summary.total_sessions, 3);
    assert_eq!(view.classification.segment, Segment::HighValueActive);
}

#[tokio::test]
async fn test_get_customer_live_before_any_pass() {
    let harness = TestHarness::new(cust0001_events(days_ago(10)));

    let view = harness
        .service
        .get_customer_at("CUST0001", reference_now())
        .await
        .unwrap();

    assert_eq!(view.source, ViewSource::Live);
    assert_eq!(view.run_id, None);
    assert_eq!(view.summary.converted_count, 1);
    // No snapshot and no fixed threshold: nobody is high value
    assert_eq!(view.classification.value_tier, ValueTier::LowValue);
    assert_eq!(view.classification.risk_tier, RiskTier::Low);
}

#[tokio::test]
async fn test_get_customer_live_uses_snapshot_threshold() {
    let harness = TestHarness::new(fleet());
    harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();
    let threshold = harness
        .snapshots
        .load_latest()
        .await
        .unwrap()
        .unwrap()
        .thresholds
        .value_threshold;

    // Arrives after the pass
    harness
        .events
        .insert_raw(purchase_funnel("CUST0100", 1, threshold + Decimal::ONE));

    let view = harness
        .service
        .get_customer_at("CUST0100", reference_now())
        .await
        .unwrap();

    assert_eq!(view.source, ViewSource::Live);
    assert_eq!(view.classification.value_tier, ValueTier::HighValue);
}

#[tokio::test]
async fn test_get_customer_not_found() {
    let harness = TestHarness::new(fleet());

    let result = harness.service.get_customer("NOPE").await;

    assert!(matches!(result, Err(ApplicationError::NotFound(_))));
}

#[tokio::test]
async fn test_get_customer_requires_id() {
    let harness = TestHarness::new(fleet());

    let result = harness.service.get_customer("  ").await;

    assert!(matches!(result, Err(ApplicationError::InvalidInput(_))));
}

#[tokio::test]
async fn test_get_metrics_before_and_after_pass() {
    let harness = TestHarness::new(fleet());

    let before = harness.service.get_metrics().await.unwrap();
    assert!(!before.computed);
    assert_eq!(before.metrics.total_customers, 0);
    assert_eq!(before.sequence, None);

    harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    let after = harness.service.get_metrics().await.unwrap();
    assert!(after.computed);
    assert_eq!(after.sequence, Some(1));
    assert_eq!(after.metrics.total_customers, 5);
    assert_eq!(after.metrics.conversions, 4);
}

#[tokio::test(start_paused = true)]
async fn test_trigger_processing_rejects_while_running() {
    let harness = TestHarness::new(fleet());
    harness.events.set_scan_delay(Some(Duration::from_secs(2)));

    let run_id = harness.service.trigger_processing().unwrap();
    let status = harness.service.run_status();
    assert_eq!(status.current_run_id, Some(run_id));

    let second = harness.service.trigger_processing();
    assert!(matches!(
        second,
        Err(ApplicationError::AlreadyRunning { run_id: active }) if active == run_id
    ));

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(harness.service.get_metrics().await.unwrap().computed);
}

#[tokio::test]
async fn test_list_customers_filters_and_paginates() {
    let harness = TestHarness::new(fleet());

    let empty = harness
        .service
        .list_customers(&CustomerFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(empty.total, 0);

    harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    let all = harness
        .service
        .list_customers(&CustomerFilter::default(), Pagination::new(1, 2))
        .await
        .unwrap();
    assert_eq!(all.total, 5);
    assert_eq!(all.total_pages, 3);
    assert_eq!(all.items[0].customer_id, "CUST0001");

    let churned = harness
        .service
        .list_customers(
            &CustomerFilter {
                churned: Some(true),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    let ids: Vec<_> = churned.items.iter().map(|c| c.customer_id.as_str()).collect();
    assert_eq!(ids, vec!["CUST0003", "CUST0005"]);

    let high_risk = harness
        .service
        .list_customers(
            &CustomerFilter {
                risk_tier: Some(RiskTier::High),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(high_risk.total, 1);
    assert_eq!(high_risk.items[0].customer_id, "CUST0005");
}

#[tokio::test]
async fn test_health_reports_degraded_store() {
    let harness = TestHarness::new(fleet());

    let healthy = harness.service.health().await;
    assert_eq!(healthy.status, HealthStatus::Healthy);
    assert_eq!(healthy.checks.len(), 2);

    harness.blobs.set_unavailable(true);
    let degraded = harness.service.health().await;
    assert_eq!(degraded.status, HealthStatus::Degraded);
    assert!(!degraded.checks["snapshot_store"].healthy);
    assert!(degraded.checks["event_store"].healthy);
}

#[tokio::test]
async fn test_live_view_counts_invalid_records() {
    let mut records = cust0001_events(days_ago(10));
    records.push(
        EventBuilder::new("CUST0001")
            .at(days_ago(2))
            .cart_value(Decimal::new(-500, 2))
            .build(),
    );
    records.push(
        EventBuilder::new("CUST0001")
            .at(days_ago(1))
            .raw_event_type("refund")
            .build(),
    );
    let harness = TestHarness::new(with_sequences(records));

    let view = harness
        .service
        .get_customer_at("CUST0001", reference_now())
        .await
        .unwrap();

    assert_eq!(view.source, ViewSource::Live);
    assert_eq!(view.summary.total_sessions, 3);
    assert_eq!(view.skipped_records, 2);
}

#[tokio::test]
async fn test_live_view_revenue_overflow_is_an_error() {
    let records = (1..=2)
        .map(|day| {
            EventBuilder::new("CUST0001")
                .at(days_ago(day))
                .purchase(Decimal::MAX)
                .build()
        })
        .collect();
    let harness = TestHarness::new(with_sequences(records));

    let result = harness
        .service
        .get_customer_at("CUST0001", reference_now())
        .await;

    assert!(matches!(result, Err(ApplicationError::RevenueOverflow(_))));
}

#[tokio::test]
async fn test_trigger_refused_when_worker_owns_processing() {
    let harness = TestHarness::new(fleet());
    let service = AnalyticsService::new(
        harness.orchestrator.clone(),
        harness.events.clone(),
        Arc::new(StaticCampaignRevenue::new()),
        harness.snapshots.clone(),
        ServiceConfig {
            accept_triggers: false,
            ..ServiceConfig::default()
        },
    );

    let result = service.trigger_processing();

    match result {
        Err(err @ ApplicationError::ProcessingDisabled(_)) => {
            assert_eq!(err.http_status(), 409);
            assert_eq!(err.error_code(), "PROCESSING_DISABLED");
        }
        other => panic!("expected ProcessingDisabled, got {:?}", other),
    }
    assert!(!harness.orchestrator.is_running());
    assert_eq!(harness.orchestrator.metrics().runs_started(), 0);
}
