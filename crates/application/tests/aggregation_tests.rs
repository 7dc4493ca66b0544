//! Tests for customer aggregation, scoring and the fleet reduction
//!
//! Covers permutation invariance, the reference customer scenarios and the
//! fleet-wide ratios.

use customer_analytics_application::{aggregate, reduce, ScoringEngine};
use customer_analytics_domain::{
    validate, CustomerClassification, CustomerSummary, Event, EventType, RiskTier, Segment,
};
use customer_analytics_testing::{
    cust0001_events, days_ago, fleet, reference_now, EventBuilder, REFERENCE_NOW,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn events(records: Vec<customer_analytics_domain::EventRecord>) -> Vec<Event> {
    records
        .into_iter()
        .map(|r| validate(r).expect("fixture records are valid"))
        .collect()
}

fn classify_all(
    records: Vec<customer_analytics_domain::EventRecord>,
) -> Vec<(CustomerSummary, CustomerClassification)> {
    let engine = ScoringEngine::default();
    let events = events(records);
    let groups = customer_analytics_application::group_by_customer(events);

    let summaries: BTreeMap<String, CustomerSummary> = groups
        .iter()
        .map(|(id, events)| {
            let summary = aggregate(id, events, REFERENCE_NOW, Decimal::ZERO).unwrap();
            (id.clone(), summary)
        })
        .collect();
    let (_, mut classifications) = engine.score_all(&summaries);

    summaries
        .into_iter()
        .map(|(id, s)| {
            let c = classifications.remove(&id).expect("every customer is scored");
            (s, c)
        })
        .collect()
}

#[test]
fn test_cust0001_scenario() {
    // Arrange
    let events = events(cust0001_events(days_ago(30)));

    // Act
    let summary = aggregate("CUST0001", &events, REFERENCE_NOW, Decimal::ZERO).unwrap();
    let classification = ScoringEngine::default().score(&summary, Decimal::MAX);

    // Assert
    assert_eq!(summary.total_sessions, 3);
    assert_eq!(summary.distinct_sessions, 1);
    assert_eq!(summary.converted_count, 1);
    assert_eq!(summary.actual_revenue, Decimal::new(29999, 2));
    assert_eq!(summary.days_since_last_transaction, Some(29));
    assert!(!classification.churned);
    assert_eq!(classification.risk_tier, RiskTier::Low);
    assert_eq!(classification.clv, Decimal::new(29999, 2));
}

#[test]
fn test_cust0001_purchase_outside_window_is_churned() {
    let events = events(cust0001_events(days_ago(120)));

    let summary = aggregate("CUST0001", &events, REFERENCE_NOW, Decimal::ZERO).unwrap();
    let classification = ScoringEngine::default().score(&summary, Decimal::MAX);

    assert!(classification.churned);
    assert_eq!(classification.risk_tier, RiskTier::Medium);
    assert_eq!(classification.segment, Segment::LowValueInactive);
}

#[test]
fn test_zero_event_customer() {
    let summary = aggregate("CUST9999", &[], REFERENCE_NOW, Decimal::ZERO).unwrap();
    let classification = ScoringEngine::default().score(&summary, Decimal::ZERO);

    assert_eq!(summary.total_sessions, 0);
    assert_eq!(summary.days_since_last_transaction, None);
    assert!(classification.churned);
    assert_eq!(classification.risk_tier, RiskTier::High);
    assert_eq!(classification.segment, Segment::LowValueInactive);
}

#[test]
fn test_recency_uses_latest_purchase_not_latest_event() {
    let records = vec![
        EventBuilder::new("C1")
            .at(days_ago(100))
            .purchase(Decimal::new(1000, 2))
            .build(),
        EventBuilder::new("C1").at(days_ago(1)).page_view().build(),
    ];

    let summary = aggregate("C1", &events(records), REFERENCE_NOW, Decimal::ZERO).unwrap();

    assert_eq!(summary.last_event_timestamp, Some(days_ago(1)));
    assert_eq!(summary.days_since_last_transaction, Some(100));
}

#[test]
fn test_fleet_conversion_rate() {
    // 465 customers, 1247 sessions, 189 conversions
    let classified = classify_all(fleet(465, 1247, 189));

    let metrics = reduce(classified.iter().map(|(s, c)| (s, c)), reference_now()).unwrap();

    assert_eq!(metrics.total_customers, 465);
    assert_eq!(metrics.total_sessions, 1247);
    assert_eq!(metrics.conversions, 189);
    assert!((metrics.conversion_rate - 15.16).abs() < 1e-9);
    assert_eq!(metrics.total_revenue, Decimal::new(945000, 2));
    assert_eq!(metrics.avg_cart_value, Decimal::new(5000, 2));
    assert_eq!(metrics.churned_customers, 465 - 189);
}

#[test]
fn test_segment_and_risk_partitions_are_total() {
    let classified = classify_all(fleet(120, 400, 70));
    let metrics = reduce(classified.iter().map(|(s, c)| (s, c)), reference_now()).unwrap();

    let by_segment: u64 = Segment::ALL.iter().map(|s| metrics.segment_count(*s)).sum();
    let by_risk: u64 = RiskTier::ALL.iter().map(|r| metrics.risk_count(*r)).sum();

    assert_eq!(by_segment, metrics.total_customers);
    assert_eq!(by_risk, metrics.total_customers);
    assert_eq!(metrics.segment_counts.len(), 4);
    assert_eq!(metrics.risk_counts.len(), 3);
}

#[test]
fn test_empty_fleet_ratios_are_zero() {
    let metrics = reduce(std::iter::empty(), reference_now()).unwrap();

    assert_eq!(metrics.total_customers, 0);
    assert_eq!(metrics.conversion_rate, 0.0);
    assert_eq!(metrics.avg_cart_value, Decimal::ZERO);
}

fn arb_event() -> impl Strategy<Value = Event> {
    (
        0i64..(REFERENCE_NOW + 86_400 * 10),
        prop::sample::select(EventType::ALL.to_vec()),
        0i64..100_000,
        0u64..5,
        0usize..3,
    )
        .prop_map(|(timestamp, event_type, cents, sequence, session)| {
            EventBuilder::new("C1")
                .at(timestamp)
                .event_type(event_type)
                .cart_value(Decimal::new(cents, 2))
                .session(format!("S{}", session))
                .sequence(sequence)
                .build_event()
        })
}

proptest! {
    #[test]
    fn prop_aggregate_is_permutation_invariant(
        events in prop::collection::vec(arb_event(), 0..40),
        seed in any::<u64>(),
    ) {
        let mut shuffled = events.clone();
        // Deterministic shuffle from the seed
        let len = shuffled.len();
        if len > 1 {
            let mut state = seed;
            for i in (1..len).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }
        }

        let a = aggregate("C1", &events, REFERENCE_NOW, Decimal::ZERO).unwrap();
        let b = aggregate("C1", &shuffled, REFERENCE_NOW, Decimal::ZERO).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_ratios_stay_in_range(
        sessions in 0usize..300,
        customers in 1usize..50,
        conversion_share in 0usize..=100,
    ) {
        let conversions = sessions * conversion_share / 100;
        let classified = classify_all(fleet(customers, sessions, conversions));
        let metrics = reduce(classified.iter().map(|(s, c)| (s, c)), reference_now()).unwrap();

        prop_assert!(metrics.conversion_rate >= 0.0);
        prop_assert!(metrics.conversion_rate <= 100.0);
        prop_assert!(metrics.avg_cart_value >= Decimal::ZERO);
        prop_assert!(metrics.churned_customers <= metrics.total_customers);
    }
}
