//! Scoring module - Customer classification
//!
//! Turns customer summaries into churn flags, risk tiers, lifetime values and
//! value/activity segments.

mod engine;

pub use engine::*;
