//! Fluent builders for test data.

use customer_analytics_domain::{validate, CustomerSummary, Event, EventRecord, EventType};
use rust_decimal::Decimal;

/// Builder for [`EventRecord`] test instances
#[derive(Clone)]
pub struct EventBuilder {
    record: EventRecord,
}

impl EventBuilder {
    /// A page view at the epoch for `customer_id`.
    pub fn new(customer_id: impl Into<String>) -> Self {
        let customer_id = customer_id.into();
        Self {
            record: EventRecord {
                session_id: format!("{}-S1", customer_id),
                customer_id,
                timestamp: 0,
                event_type: EventType::PageView.as_str().to_string(),
                page_url: "/".to_string(),
                cart_value: Decimal::ZERO,
                converted: None,
                sequence: 0,
            },
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.record.timestamp = timestamp;
        self
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.record.event_type = event_type.as_str().to_string();
        self
    }

    /// Set an arbitrary, possibly unknown, event type string.
    pub fn raw_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.record.event_type = event_type.into();
        self
    }

    pub fn page_view(self) -> Self {
        self.event_type(EventType::PageView).page("/products")
    }

    pub fn cart_add(self, cart_value: Decimal) -> Self {
        self.event_type(EventType::CartAdd)
            .page("/cart")
            .cart_value(cart_value)
    }

    pub fn purchase(self, cart_value: Decimal) -> Self {
        self.event_type(EventType::Purchase)
            .page("/checkout")
            .cart_value(cart_value)
            .converted(true)
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.record.session_id = session_id.into();
        self
    }

    pub fn page(mut self, page_url: impl Into<String>) -> Self {
        self.record.page_url = page_url.into();
        self
    }

    pub fn cart_value(mut self, cart_value: Decimal) -> Self {
        self.record.cart_value = cart_value;
        self
    }

    /// Stored conversion flag; validation recomputes it.
    pub fn converted(mut self, converted: bool) -> Self {
        self.record.converted = Some(converted);
        self
    }

    pub fn sequence(mut self, sequence: u64) -> Self {
        self.record.sequence = sequence;
        self
    }

    pub fn build(self) -> EventRecord {
        self.record
    }

    /// Build and validate.
    ///
    /// # Panics
    ///
    /// When the record is invalid.
    pub fn build_event(self) -> Event {
        match validate(self.record) {
            Ok(event) => event,
            Err(err) => panic!("builder produced an invalid event: {}", err),
        }
    }
}

/// Builder for [`CustomerSummary`] test instances, bypassing aggregation
#[derive(Clone)]
pub struct SummaryBuilder {
    summary: CustomerSummary,
}

impl SummaryBuilder {
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            summary: CustomerSummary::empty(customer_id.into()),
        }
    }

    pub fn sessions(mut self, total: u64) -> Self {
        self.summary.total_sessions = total;
        self.summary.distinct_sessions = total.min(1);
        self
    }

    pub fn conversions(mut self, count: u64) -> Self {
        self.summary.converted_count = count;
        self
    }

    pub fn revenue(mut self, actual: Decimal) -> Self {
        self.summary.actual_revenue = actual;
        self
    }

    pub fn campaign_revenue(mut self, campaign: Decimal) -> Self {
        self.summary.campaign_revenue = campaign;
        self
    }

    pub fn days_since_purchase(mut self, days: Option<i64>) -> Self {
        self.summary.days_since_last_transaction = days;
        self.summary.last_purchase_timestamp = days.map(|d| -d * 86_400);
        self
    }

    pub fn build(self) -> CustomerSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_builder_purchase() {
        let event = EventBuilder::new("C1").at(120).purchase(Decimal::new(1000, 2)).build_event();
        assert_eq!(event.event_type, EventType::Purchase);
        assert!(event.converted);
        assert_eq!(event.timestamp, 120);
    }

    #[test]
    fn test_summary_builder() {
        let summary = SummaryBuilder::new("C1")
            .sessions(4)
            .conversions(1)
            .revenue(Decimal::new(1250, 2))
            .campaign_revenue(Decimal::new(250, 2))
            .days_since_purchase(Some(3))
            .build();
        assert_eq!(summary.clv(), Decimal::new(1500, 2));
        assert_eq!(summary.days_since_last_transaction, Some(3));
    }
}
