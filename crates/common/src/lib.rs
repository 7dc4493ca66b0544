//! Common utilities shared by the customer analytics services.
//!
//! This crate provides:
//! - Configuration management
//! - Telemetry (structured logging)
//! - DateTime helpers
//! - Retry logic with backoff

pub mod config;
pub mod datetime;
pub mod retry;
pub mod telemetry;

// Re-export commonly used types
pub use config::{
    AggregationSettings, AppConfig, EventStoreBackend, EventStoreConfig, SchedulerSettings,
    ScoringSettings, ServerConfig, SnapshotStoreBackend, SnapshotStoreConfig, TelemetryConfig,
};
pub use datetime::{format_datetime, now_utc, parse_datetime, whole_days_between};
pub use retry::{retry_with_backoff, retry_with_predicate, RetryConfig};
pub use telemetry::init_tracing;

/// Common error type used throughout the crate
pub type Result<T> = std::result::Result<T, anyhow::Error>;
