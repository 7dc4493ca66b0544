//! Customer Aggregator
//!
//! Folds the events of one customer into a [`CustomerSummary`]. The fold is a
//! pure function of its inputs: the same events in any order, with the same
//! reference time, always give the same summary.

use customer_analytics_common::datetime::whole_days_between;
use customer_analytics_domain::{CustomerSummary, Event, RevenueOverflow};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};

/// Build the summary of `customer_id` as of `now` (Unix seconds).
///
/// Events of other customers and events later than `now` are ignored.
/// Recency is measured from the latest purchase, not the latest event.
///
/// Fails when realized revenue, or realized plus campaign revenue, does not
/// fit in a `Decimal`.
pub fn aggregate(
    customer_id: &str,
    events: &[Event],
    now: i64,
    campaign_revenue: Decimal,
) -> Result<CustomerSummary, RevenueOverflow> {
    let mut sessions: Vec<Event> = events
        .iter()
        .filter(|e| e.customer_id == customer_id && e.timestamp <= now)
        .cloned()
        .collect();
    sessions.sort_by(Event::chronological);

    let mut summary = CustomerSummary::empty(customer_id);
    summary.campaign_revenue = campaign_revenue;

    let mut session_ids = BTreeSet::new();
    for event in &sessions {
        session_ids.insert(event.session_id.as_str());

        if event.is_purchase() {
            summary.last_purchase_timestamp = Some(event.timestamp);
        }
        if event.converted {
            summary.converted_count += 1;
            summary.actual_revenue = summary
                .actual_revenue
                .checked_add(event.cart_value)
                .ok_or_else(|| RevenueOverflow::customer(customer_id))?;
        }
    }
    if summary.checked_clv().is_none() {
        return Err(RevenueOverflow::customer(customer_id));
    }

    summary.total_sessions = sessions.len() as u64;
    summary.distinct_sessions = session_ids.len() as u64;
    summary.last_event_timestamp = sessions.last().map(|e| e.timestamp);
    summary.days_since_last_transaction = summary
        .last_purchase_timestamp
        .map(|ts| whole_days_between(ts, now));
    summary.sessions = sessions;

    Ok(summary)
}

/// Partition events by customer id.
pub fn group_by_customer(events: Vec<Event>) -> BTreeMap<String, Vec<Event>> {
    let mut groups: BTreeMap<String, Vec<Event>> = BTreeMap::new();
    for event in events {
        groups.entry(event.customer_id.clone()).or_default().push(event);
    }
    groups
}
