//! Customer Analytics Domain Types
//!
//! This crate provides the core domain model for the customer analytics engine.
//! It defines behavioral events, per-customer summaries and classifications,
//! fleet-wide metrics, persisted snapshots and the aggregation run state machine.
//!
//! ## Architecture
//!
//! The domain layer is organized into the following modules:
//!
//! - **identifiers**: Strongly-typed UUID-based identifiers
//! - **event**: Raw event records, the validated `Event` type and validation rules
//! - **customer**: Customer summaries, tiers, segments and classifications
//! - **metrics**: Fleet-wide metrics for one aggregation pass
//! - **snapshot**: The versioned record persisted after each pass
//! - **aggregation**: Aggregation run states and run status
//! - **errors**: Validation and state transition errors
//!
//! ## Usage
//!
//! ```rust
//! use customer_analytics_domain::event::{validate, EventRecord, EventType};
//! use rust_decimal::Decimal;
//!
//! let record = EventRecord {
//!     customer_id: "CUST0001".to_string(),
//!     timestamp: 1_700_000_000,
//!     event_type: "purchase".to_string(),
//!     session_id: "S1".to_string(),
//!     page_url: "/checkout".to_string(),
//!     cart_value: Decimal::new(29999, 2),
//!     converted: None,
//!     sequence: 0,
//! };
//!
//! let event = validate(record).unwrap();
//! assert_eq!(event.event_type, EventType::Purchase);
//! assert!(event.converted);
//! ```

#![warn(clippy::all)]

pub mod aggregation;
pub mod customer;
pub mod errors;
pub mod event;
pub mod identifiers;
pub mod metrics;
pub mod snapshot;

// Re-export commonly used types
pub use aggregation::{AggregationState, RunStatus};
pub use customer::{
    ActivityTier, CustomerClassification, CustomerSummary, RiskTier, Segment, ValueTier,
};
pub use errors::{RevenueOverflow, StateTransitionError, ValidationError};
pub use event::{validate, Event, EventRecord, EventType};
pub use identifiers::RunId;
pub use metrics::MetricsSnapshot;
pub use snapshot::{CustomerRecord, RunReport, ScoringThresholds, SnapshotRecord, ThresholdSource};

/// Seconds in one day, used for recency arithmetic.
pub const SECONDS_PER_DAY: i64 = 86_400;
