//! Application layer for the customer analytics engine
//!
//! This crate turns raw customer events into classifications and fleet-wide
//! metrics, and serves the results.
//!
//! ## Architecture
//!
//! The application layer sits between the domain and infrastructure layers.
//! External stores are reached through the traits in [`ports`]; concrete
//! adapters live in the infrastructure crate.
//!
//! ## Modules
//!
//! - `aggregator` - Folds one customer's events into a summary
//! - `scoring` - Churn, risk, lifetime value and segment classification
//! - `reducer` - Fleet-wide metrics fold
//! - `snapshot` - Versioned snapshot persistence over a blob store
//! - `orchestrator` - Aggregation pass entry point and state machine
//! - `services` - Query service consumed by the HTTP layer
//! - `metrics` - Run counters

pub mod aggregator;
pub mod metrics;
pub mod orchestrator;
pub mod ports;
pub mod reducer;
pub mod scoring;
pub mod services;
pub mod snapshot;

// Re-export commonly used types
pub use aggregator::{aggregate, group_by_customer};
pub use metrics::{RunMetrics, RunMetricsSnapshot};
pub use orchestrator::{AggregationOrchestrator, OrchestratorConfig, RunOutcome, RunRequest};
pub use ports::{BlobStore, CampaignRevenueSource, EventStore, NoCampaignRevenue};
pub use reducer::{reduce, MetricsAccumulator};
pub use scoring::{ScoringConfig, ScoringEngine, ScoringEngineBuilder};
pub use services::{
    AnalyticsService, ComponentCheck, CustomerFilter, CustomerListItem, CustomerView, HealthReport,
    HealthStatus, MetricsView, PaginatedResult, Pagination, ServiceConfig, ViewSource,
};
pub use snapshot::SnapshotStore;

use customer_analytics_domain::{RevenueOverflow, RunId};
use thiserror::Error;

/// Application-level errors
#[derive(Error, Debug, Clone)]
pub enum ApplicationError {
    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An aggregation pass is already in progress
    #[error("Aggregation run {run_id} is already in progress")]
    AlreadyRunning { run_id: RunId },

    /// Event store or blob store unreachable
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Deadline exceeded
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Passes are run by a standalone worker, not by this process
    #[error("Processing disabled: {0}")]
    ProcessingDisabled(String),

    /// The latest snapshot is newer than the one being saved
    #[error("Snapshot conflict: {0}")]
    SnapshotConflict(String),

    /// A revenue sum does not fit in a decimal
    #[error("Revenue overflow: {0}")]
    RevenueOverflow(String),

    /// Snapshot encoding or decoding failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Get HTTP status code for this error
    pub fn http_status(&self) -> u16 {
        match self {
            ApplicationError::NotFound(_) => 404,
            ApplicationError::InvalidInput(_) => 400,
            ApplicationError::AlreadyRunning { .. } => 409,
            ApplicationError::StoreUnavailable(_) => 503,
            ApplicationError::Timeout(_) => 504,
            ApplicationError::ProcessingDisabled(_) => 409,
            ApplicationError::SnapshotConflict(_) => 409,
            ApplicationError::RevenueOverflow(_) => 422,
            ApplicationError::Serialization(_) => 500,
            ApplicationError::Internal(_) => 500,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApplicationError::StoreUnavailable(_) | ApplicationError::Timeout(_)
        )
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            ApplicationError::NotFound(_) => "NOT_FOUND",
            ApplicationError::InvalidInput(_) => "INVALID_INPUT",
            ApplicationError::AlreadyRunning { .. } => "ALREADY_RUNNING",
            ApplicationError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ApplicationError::Timeout(_) => "TIMEOUT",
            ApplicationError::ProcessingDisabled(_) => "PROCESSING_DISABLED",
            ApplicationError::SnapshotConflict(_) => "SNAPSHOT_CONFLICT",
            ApplicationError::RevenueOverflow(_) => "REVENUE_OVERFLOW",
            ApplicationError::Serialization(_) => "SERIALIZATION_ERROR",
            ApplicationError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for ApplicationError {
    fn from(err: serde_json::Error) -> Self {
        ApplicationError::Serialization(err.to_string())
    }
}

impl From<RevenueOverflow> for ApplicationError {
    fn from(err: RevenueOverflow) -> Self {
        ApplicationError::RevenueOverflow(err.to_string())
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_http_status() {
        assert_eq!(ApplicationError::NotFound("test".to_string()).http_status(), 404);
        assert_eq!(ApplicationError::InvalidInput("test".to_string()).http_status(), 400);
        assert_eq!(
            ApplicationError::AlreadyRunning { run_id: RunId::new() }.http_status(),
            409
        );
        assert_eq!(ApplicationError::StoreUnavailable("test".to_string()).http_status(), 503);
        assert_eq!(ApplicationError::Timeout("test".to_string()).http_status(), 504);
        assert_eq!(ApplicationError::Internal("test".to_string()).http_status(), 500);
        assert_eq!(
            ApplicationError::ProcessingDisabled("test".to_string()).http_status(),
            409
        );
        assert_eq!(ApplicationError::SnapshotConflict("test".to_string()).http_status(), 409);
    }

    #[test]
    fn test_revenue_overflow_conversion() {
        let err = ApplicationError::from(RevenueOverflow::fleet());
        assert_eq!(err.http_status(), 422);
        assert_eq!(err.error_code(), "REVENUE_OVERFLOW");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_retryable() {
        assert!(ApplicationError::StoreUnavailable("test".to_string()).is_retryable());
        assert!(ApplicationError::Timeout("test".to_string()).is_retryable());
        assert!(!ApplicationError::NotFound("test".to_string()).is_retryable());
        assert!(!ApplicationError::AlreadyRunning { run_id: RunId::new() }.is_retryable());
        assert!(!ApplicationError::Serialization("test".to_string()).is_retryable());
    }

    #[test]
    fn test_already_running_names_active_run() {
        let run_id = RunId::new();
        let err = ApplicationError::AlreadyRunning { run_id };
        assert!(err.to_string().contains(&run_id.to_string()));
        assert_eq!(err.error_code(), "ALREADY_RUNNING");
    }
}
