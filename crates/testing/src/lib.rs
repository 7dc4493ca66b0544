//! Testing utilities for the customer analytics engine
//!
//! This crate provides:
//! - Fixtures: reference times, canned customer histories, synthetic fleets
//! - Builders for events and summaries
//! - Fake event and blob stores with failure injection
//! - A harness wiring the orchestrator and query service over the fakes
//!
//! # Examples
//!
//! ```
//! use customer_analytics_testing::{cust0001_events, days_ago, TestHarness};
//!
//! let harness = TestHarness::new(cust0001_events(days_ago(10)));
//! assert_eq!(harness.events.len(), 3);
//! ```

pub mod builders;
pub mod fixtures;
pub mod mocks;

pub use builders::*;
pub use fixtures::*;
pub use mocks::*;

// Re-export testing dependencies for convenience
pub use fake;
pub use proptest;
pub use wiremock;
