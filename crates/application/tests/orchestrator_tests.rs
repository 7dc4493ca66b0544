//! Tests for the aggregation orchestrator
//!
//! Tests idempotent reruns, failure atomicity, deadlines, re-entrancy, recovery
//! after failed background passes and the snapshot pointer.

use customer_analytics_application::snapshot::SnapshotStore;
use customer_analytics_application::{
    AggregationOrchestrator, ApplicationError, OrchestratorConfig, RunRequest, ScoringEngine,
};
use customer_analytics_domain::{AggregationState, RiskTier, Segment};
use customer_analytics_testing::{
    cust0001_events, days_ago, fleet, purchase_funnel, reference_now, test_orchestrator_config,
    with_sequences, EventBuilder, FakeEventStore, StaticCampaignRevenue, TestHarness,
    REFERENCE_NOW,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Wait until no pass is running.
async fn wait_until_idle(orchestrator: &AggregationOrchestrator) {
    for _ in 0..500 {
        if !orchestrator.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("aggregation pass did not finish");
}

fn overflowing_purchases(customer_id: &str) -> Vec<customer_analytics_domain::EventRecord> {
    (1..=2)
        .map(|day| {
            EventBuilder::new(customer_id)
                .at(days_ago(day))
                .purchase(Decimal::MAX)
                .build()
        })
        .collect()
}

fn mixed_fleet() -> Vec<customer_analytics_domain::EventRecord> {
    let mut records = Vec::new();
    records.extend(purchase_funnel("CUST0001", 5, Decimal::new(50000, 2)));
    records.extend(purchase_funnel("CUST0002", 100, Decimal::new(2000, 2)));
    records.extend(purchase_funnel("CUST0003", 200, Decimal::new(9000, 2)));
    records.extend(purchase_funnel("CUST0004", 20, Decimal::new(1500, 2)));
    records.push(EventBuilder::new("CUST0005").at(days_ago(3)).page_view().build());
    with_sequences(records)
}

#[tokio::test]
async fn test_run_aggregation_happy_path() {
    // Arrange
    let harness = TestHarness::new(cust0001_events(days_ago(10)));

    // Act
    let outcome = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    // Assert
    assert_eq!(outcome.sequence, 1);
    assert_eq!(outcome.metrics.total_customers, 1);
    assert_eq!(outcome.metrics.total_sessions, 3);
    assert_eq!(outcome.metrics.conversions, 1);
    assert_eq!(outcome.metrics.timestamp, reference_now());
    assert_eq!(outcome.report.valid_events, 3);

    let status = harness.orchestrator.status();
    assert_eq!(status.state, AggregationState::Succeeded);
    assert_eq!(status.last_run_id, Some(outcome.run_id));
    assert_eq!(status.current_run_id, None);
    assert_eq!(status.last_sequence, Some(1));

    let snapshot = harness.snapshots.load_latest().await.unwrap().unwrap();
    let customer = snapshot.customer("CUST0001").unwrap();
    assert_eq!(customer.classification.risk_tier, RiskTier::Low);
    // A lone customer sits exactly on the percentile, which is not above it
    assert_eq!(customer.classification.segment, Segment::LowValueActive);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = TestHarness::new(mixed_fleet());

    let first = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();
    let first_snapshot = harness.snapshots.load_latest().await.unwrap().unwrap();

    let second = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();
    let second_snapshot = harness.snapshots.load_latest().await.unwrap().unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(second.sequence, first.sequence + 1);
    assert_eq!(first.metrics, second.metrics);
    assert_eq!(first_snapshot.customers, second_snapshot.customers);
    assert_eq!(first_snapshot.thresholds, second_snapshot.thresholds);
}

#[tokio::test]
async fn test_parallel_workers_match_sequential() {
    let records = fleet(80, 300, 40);
    let sequential = TestHarness::new(records.clone());
    let parallel = TestHarness::with_options(
        records,
        StaticCampaignRevenue::new(),
        ScoringEngine::default(),
        OrchestratorConfig {
            workers: 4,
            ..test_orchestrator_config()
        },
    );

    let a = sequential
        .orchestrator
        .run_aggregation(sequential.request())
        .await
        .unwrap();
    let b = parallel
        .orchestrator
        .run_aggregation(parallel.request())
        .await
        .unwrap();

    assert_eq!(a.metrics, b.metrics);
    let a_snapshot = sequential.snapshots.load_latest().await.unwrap().unwrap();
    let b_snapshot = parallel.snapshots.load_latest().await.unwrap().unwrap();
    assert_eq!(a_snapshot.customers, b_snapshot.customers);
}

#[tokio::test]
async fn test_event_store_outage_writes_nothing() {
    let harness = TestHarness::new(mixed_fleet());
    harness.events.set_unavailable(true);

    let result = harness.orchestrator.run_aggregation(harness.request()).await;

    assert!(matches!(result, Err(ApplicationError::StoreUnavailable(_))));
    assert_eq!(harness.blobs.object_count(), 0);
    assert!(harness.snapshots.load_latest().await.unwrap().is_none());

    let status = harness.orchestrator.status();
    assert_eq!(status.state, AggregationState::Failed);
    assert!(status.last_error.is_some());
    assert_eq!(harness.orchestrator.metrics().runs_failed(), 1);
}

#[tokio::test]
async fn test_failed_pass_keeps_previous_snapshot() {
    let harness = TestHarness::new(mixed_fleet());
    let first = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    harness.blobs.set_fail_writes(true);
    let result = harness.orchestrator.run_aggregation(harness.request()).await;
    assert!(result.is_err());

    let pointer = harness.snapshots.latest_pointer().await.unwrap().unwrap();
    assert_eq!(pointer.run_id, first.run_id);
    assert_eq!(pointer.sequence, 1);
    assert_eq!(harness.snapshots.versions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_transient_fetch_errors_are_retried() {
    let harness = TestHarness::new(mixed_fleet());
    harness.events.fail_next_scans(2);

    let outcome = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    assert_eq!(outcome.metrics.total_customers, 5);
    assert_eq!(harness.events.scan_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_expiry_fails_pass() {
    let harness = TestHarness::new(mixed_fleet());
    harness.events.set_scan_delay(Some(Duration::from_secs(10)));

    let request = RunRequest::new(reference_now(), Duration::from_secs(1));
    let result = harness.orchestrator.run_aggregation(request).await;

    assert!(matches!(result, Err(ApplicationError::Timeout(_))));
    assert_eq!(harness.blobs.object_count(), 0);
    assert_eq!(harness.orchestrator.status().state, AggregationState::Failed);
    assert!(!harness.orchestrator.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_second_request_while_running_is_rejected() {
    let harness = TestHarness::new(mixed_fleet());
    harness.events.set_scan_delay(Some(Duration::from_secs(5)));

    let run_id = harness.orchestrator.trigger(harness.request()).unwrap();
    assert!(harness.orchestrator.is_running());

    let second = harness.orchestrator.run_aggregation(harness.request()).await;
    match second {
        Err(ApplicationError::AlreadyRunning { run_id: active }) => assert_eq!(active, run_id),
        other => panic!("expected AlreadyRunning, got {:?}", other.map(|o| o.run_id)),
    }
    assert_eq!(harness.orchestrator.metrics().runs_rejected(), 1);

    tokio::time::sleep(Duration::from_secs(6)).await;

    let status = harness.orchestrator.status();
    assert_eq!(status.state, AggregationState::Succeeded);
    assert_eq!(status.last_run_id, Some(run_id));
    assert_eq!(harness.snapshots.latest_sequence().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_snapshot_pointer_follows_latest_version() {
    let harness = TestHarness::new(mixed_fleet());

    let first = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();
    let second = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    let versions = harness.snapshots.versions().await.unwrap();
    assert_eq!(
        versions,
        vec![
            SnapshotStore::body_key(1, &first.run_id),
            SnapshotStore::body_key(2, &second.run_id),
        ]
    );

    let pointer = harness.snapshots.latest_pointer().await.unwrap().unwrap();
    assert_eq!(pointer.key, SnapshotStore::body_key(2, &second.run_id));

    // An orphaned body without a pointer update is never served
    harness.blobs.put(
        &SnapshotStore::body_key(3, &second.run_id),
        b"{ partial".to_vec(),
    );
    let latest = harness.snapshots.load_latest().await.unwrap().unwrap();
    assert_eq!(latest.sequence, 2);
    assert_eq!(harness.snapshots.next_sequence().await.unwrap(), 3);
}

#[tokio::test]
async fn test_invalid_and_future_events_are_counted() {
    let mut records = cust0001_events(days_ago(10));
    records.push(EventBuilder::new("").at(days_ago(1)).build());
    records.push(EventBuilder::new("CUST0002").at(-5).build());
    records.push(
        EventBuilder::new("CUST0002")
            .at(days_ago(1))
            .cart_value(Decimal::new(-100, 2))
            .build(),
    );
    records.push(
        EventBuilder::new("CUST0002")
            .at(days_ago(1))
            .raw_event_type("refund")
            .build(),
    );
    records.push(EventBuilder::new("CUST0003").at(REFERENCE_NOW + 60).build());

    let harness = TestHarness::new(with_sequences(records));
    let outcome = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    let report = outcome.report;
    assert_eq!(report.total_records, 8);
    assert_eq!(report.valid_events, 3);
    assert_eq!(report.skipped_records, 4);
    assert_eq!(report.future_events, 1);
    assert_eq!(report.customers, 1);
    for kind in [
        "empty_customer_id",
        "negative_timestamp",
        "negative_cart_value",
        "unknown_event_type",
    ] {
        assert_eq!(report.skipped_by_kind.get(kind), Some(&1), "{}", kind);
    }
}

#[tokio::test]
async fn test_no_events_produces_computed_empty_snapshot() {
    let harness = TestHarness::new(Vec::new());

    let outcome = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();

    assert_eq!(outcome.metrics.total_customers, 0);
    assert_eq!(outcome.metrics.conversion_rate, 0.0);
    let snapshot = harness.snapshots.load_latest().await.unwrap().unwrap();
    assert!(snapshot.customers.is_empty());
}

#[tokio::test]
async fn test_campaign_revenue_feeds_clv_not_fleet_revenue() {
    let campaign = StaticCampaignRevenue::new().with("CUST0001", Decimal::new(10000, 2));
    let harness = TestHarness::with_options(
        cust0001_events(days_ago(10)),
        campaign,
        ScoringEngine::default(),
        test_orchestrator_config(),
    );

    let outcome = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();
    let snapshot = harness.snapshots.load_latest().await.unwrap().unwrap();

    let customer = snapshot.customer("CUST0001").unwrap();
    assert_eq!(customer.classification.clv, Decimal::new(39999, 2));
    assert_eq!(outcome.metrics.total_revenue, Decimal::new(29999, 2));
}

#[tokio::test]
async fn test_customer_revenue_overflow_is_skipped_and_counted() {
    let mut records = mixed_fleet();
    records.extend(overflowing_purchases("CUST0009"));
    let harness = TestHarness::new(with_sequences(records));

    let run_id = harness.orchestrator.trigger(harness.request()).unwrap();
    wait_until_idle(&harness.orchestrator).await;

    let status = harness.orchestrator.status();
    assert_eq!(status.state, AggregationState::Succeeded);
    assert_eq!(status.last_run_id, Some(run_id));
    let report = status.last_report.unwrap();
    assert_eq!(report.overflowed_customers, 1);
    assert_eq!(report.customers, 5);

    let snapshot = harness.snapshots.load_latest().await.unwrap().unwrap();
    assert!(snapshot.customer("CUST0009").is_none());
    assert_eq!(snapshot.metrics.total_customers, 5);

    // The orchestrator accepts the next pass
    harness.orchestrator.trigger(harness.request()).unwrap();
    wait_until_idle(&harness.orchestrator).await;
    assert_eq!(harness.snapshots.latest_sequence().await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_fleet_revenue_overflow_fails_pass_without_writing() {
    let mut records = Vec::new();
    for customer_id in ["CUST0001", "CUST0002"] {
        records.push(
            EventBuilder::new(customer_id)
                .at(days_ago(1))
                .purchase(Decimal::MAX)
                .build(),
        );
    }
    let harness = TestHarness::new(with_sequences(records));

    let result = harness.orchestrator.run_aggregation(harness.request()).await;

    assert!(matches!(result, Err(ApplicationError::RevenueOverflow(_))));
    assert_eq!(harness.blobs.object_count(), 0);
    assert_eq!(harness.orchestrator.status().state, AggregationState::Failed);
    assert!(!harness.orchestrator.is_running());
}

#[tokio::test]
async fn test_failed_background_pass_allows_next_trigger() {
    let harness = TestHarness::new(mixed_fleet());
    harness.events.set_unavailable(true);

    let failed = harness.orchestrator.trigger(harness.request()).unwrap();
    wait_until_idle(&harness.orchestrator).await;

    let status = harness.orchestrator.status();
    assert_eq!(status.state, AggregationState::Failed);
    assert_eq!(status.last_run_id, Some(failed));
    assert!(status.last_error.is_some());

    harness.events.set_unavailable(false);
    let next = harness.orchestrator.trigger(harness.request()).unwrap();
    wait_until_idle(&harness.orchestrator).await;

    let status = harness.orchestrator.status();
    assert_eq!(status.state, AggregationState::Succeeded);
    assert_eq!(status.last_run_id, Some(next));
    assert_eq!(harness.snapshots.latest_sequence().await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_panicking_pass_is_marked_failed() {
    let harness = TestHarness::with_options(
        mixed_fleet(),
        StaticCampaignRevenue::new().panic_next_reads(1),
        ScoringEngine::default(),
        test_orchestrator_config(),
    );

    let aborted = harness.orchestrator.trigger(harness.request()).unwrap();
    wait_until_idle(&harness.orchestrator).await;

    let status = harness.orchestrator.status();
    assert_eq!(status.state, AggregationState::Failed);
    assert_eq!(status.current_run_id, None);
    assert_eq!(status.last_run_id, Some(aborted));
    assert!(status.last_error.unwrap().contains("aborted"));
    assert_eq!(harness.orchestrator.metrics().runs_failed(), 1);
    assert_eq!(harness.blobs.object_count(), 0);

    let next = harness
        .orchestrator
        .run_aggregation(harness.request())
        .await
        .unwrap();
    assert_eq!(next.sequence, 1);
    assert_eq!(harness.orchestrator.status().state, AggregationState::Succeeded);
}

#[tokio::test(start_paused = true)]
async fn test_older_pass_cannot_replace_newer_snapshot() {
    // Two processes sharing one snapshot store
    let harness = TestHarness::new(mixed_fleet());
    harness.events.set_scan_delay(Some(Duration::from_secs(1)));

    let slow_events = FakeEventStore::with_records(mixed_fleet()).shared();
    slow_events.set_scan_delay(Some(Duration::from_secs(5)));
    let other = Arc::new(AggregationOrchestrator::new(
        slow_events,
        Arc::new(StaticCampaignRevenue::new()),
        SnapshotStore::new(harness.blobs.clone()),
        ScoringEngine::default(),
        test_orchestrator_config(),
    ));

    let older = RunRequest::new(
        reference_now() - chrono::Duration::days(1),
        Duration::from_secs(30),
    );
    other.trigger(older).unwrap();
    let newer = harness.orchestrator.trigger(harness.request()).unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(harness.orchestrator.status().state, AggregationState::Succeeded);
    let status = other.status();
    assert_eq!(status.state, AggregationState::Failed);
    assert!(status.last_error.unwrap().contains("older than the latest snapshot"));

    let pointer = harness.snapshots.latest_pointer().await.unwrap().unwrap();
    assert_eq!(pointer.run_id, newer);
    assert_eq!(pointer.now, Some(reference_now()));
    assert_eq!(
        harness.snapshots.versions().await.unwrap(),
        vec![SnapshotStore::body_key(1, &newer)]
    );
}
