//! Customer behavioral events.
//!
//! Events arrive from the event store as loosely typed [`EventRecord`]s. The
//! engine only ever works with [`Event`], which can be obtained through
//! [`validate`] alone.

use crate::errors::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Kind of customer interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PageView,
    CartAdd,
    Purchase,
}

impl EventType {
    pub const ALL: [EventType; 3] = [Self::PageView, Self::CartAdd, Self::Purchase];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PageView => "page_view",
            Self::CartAdd => "cart_add",
            Self::Purchase => "purchase",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "page_view" => Ok(Self::PageView),
            "cart_add" => Ok(Self::CartAdd),
            "purchase" => Ok(Self::Purchase),
            other => Err(ValidationError::UnknownEventType {
                event_type: other.to_string(),
            }),
        }
    }
}

/// Event as stored, before validation.
///
/// `event_type` is a free string, `cart_value` may be negative and the
/// `converted` flag is not trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub customer_id: String,
    pub timestamp: i64,
    pub event_type: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub cart_value: Decimal,
    #[serde(default)]
    pub converted: Option<bool>,
    /// Arrival order assigned by the event store on append
    #[serde(default)]
    pub sequence: u64,
}

/// A validated customer interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub customer_id: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub event_type: EventType,
    pub session_id: String,
    pub page_url: String,
    pub cart_value: Decimal,
    /// True only for purchases with a positive cart value
    pub converted: bool,
    pub sequence: u64,
}

impl Event {
    /// Chronological ordering key. Timestamp ties are broken by arrival order.
    #[inline]
    pub fn order_key(&self) -> (i64, u64) {
        (self.timestamp, self.sequence)
    }

    /// Compare two events chronologically.
    ///
    /// Events sharing a timestamp and sequence fall back to their remaining
    /// fields, so sorting never depends on input order.
    pub fn chronological(a: &Event, b: &Event) -> Ordering {
        a.order_key()
            .cmp(&b.order_key())
            .then_with(|| a.event_type.cmp(&b.event_type))
            .then_with(|| a.session_id.cmp(&b.session_id))
            .then_with(|| a.page_url.cmp(&b.page_url))
            .then_with(|| a.cart_value.cmp(&b.cart_value))
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    }

    pub fn is_purchase(&self) -> bool {
        self.event_type == EventType::Purchase
    }
}

/// Convert a stored record into an [`Event`].
///
/// `converted` is always recomputed from the event type and cart value.
pub fn validate(record: EventRecord) -> Result<Event, ValidationError> {
    if record.customer_id.trim().is_empty() {
        return Err(ValidationError::EmptyCustomerId);
    }

    if record.timestamp < 0 {
        return Err(ValidationError::NegativeTimestamp {
            timestamp: record.timestamp,
        });
    }

    if record.cart_value < Decimal::ZERO {
        return Err(ValidationError::NegativeCartValue {
            cart_value: record.cart_value.to_string(),
        });
    }

    let event_type: EventType = record.event_type.trim().parse()?;
    let converted = event_type == EventType::Purchase && record.cart_value > Decimal::ZERO;

    Ok(Event {
        customer_id: record.customer_id,
        timestamp: record.timestamp,
        event_type,
        session_id: record.session_id,
        page_url: record.page_url,
        cart_value: record.cart_value,
        converted,
        sequence: record.sequence,
    })
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        Self {
            customer_id: event.customer_id,
            timestamp: event.timestamp,
            event_type: event.event_type.as_str().to_string(),
            session_id: event.session_id,
            page_url: event.page_url,
            cart_value: event.cart_value,
            converted: Some(event.converted),
            sequence: event.sequence,
        }
    }
}
