//! Error types for the customer analytics domain.
//!
//! Validation errors are never fatal to an aggregation pass: the offending
//! record is skipped and counted under the error's [`ValidationError::kind`].

use crate::aggregation::AggregationState;
use serde::{Deserialize, Serialize};

/// Reasons a stored event record cannot become an [`Event`](crate::event::Event).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// Customer id is empty or whitespace only
    #[error("customer_id must not be empty")]
    EmptyCustomerId,

    /// Timestamp before the Unix epoch
    #[error("timestamp must be non-negative, got {timestamp}")]
    NegativeTimestamp { timestamp: i64 },

    /// Cart value below zero
    #[error("cart_value must be non-negative, got {cart_value}")]
    NegativeCartValue { cart_value: String },

    /// Event type outside the closed set
    #[error("unknown event_type: {event_type}")]
    UnknownEventType { event_type: String },
}

impl ValidationError {
    /// Stable code used to count rejections in a run report.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyCustomerId => "empty_customer_id",
            Self::NegativeTimestamp { .. } => "negative_timestamp",
            Self::NegativeCartValue { .. } => "negative_cart_value",
            Self::UnknownEventType { .. } => "unknown_event_type",
        }
    }

    /// Error code for API responses
    pub fn error_code(&self) -> &'static str {
        "VALIDATION_ERROR"
    }
}

/// An aggregation run attempted an illegal state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid state transition from {from} to {to}")]
pub struct StateTransitionError {
    pub from: AggregationState,
    pub to: AggregationState,
}

/// A revenue sum left the range of `Decimal`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("revenue of {scope} exceeds the representable range")]
pub struct RevenueOverflow {
    pub scope: String,
}

impl RevenueOverflow {
    pub fn customer(customer_id: &str) -> Self {
        Self {
            scope: format!("customer {}", customer_id),
        }
    }

    pub fn fleet() -> Self {
        Self {
            scope: "the fleet".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_kinds_are_distinct() {
        let errors = [
            ValidationError::EmptyCustomerId,
            ValidationError::NegativeTimestamp { timestamp: -1 },
            ValidationError::NegativeCartValue {
                cart_value: "-1".to_string(),
            },
            ValidationError::UnknownEventType {
                event_type: "refund".to_string(),
            },
        ];

        let mut kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::UnknownEventType {
            event_type: "refund".to_string(),
        };
        assert_eq!(err.to_string(), "unknown event_type: refund");
    }

    #[test]
    fn test_revenue_overflow_display() {
        assert_eq!(
            RevenueOverflow::customer("CUST0001").to_string(),
            "revenue of customer CUST0001 exceeds the representable range"
        );
    }
}
