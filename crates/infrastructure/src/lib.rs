//! Infrastructure layer for the customer analytics engine
//!
//! This crate provides the concrete adapters behind the application ports:
//! - Event stores (PostgreSQL with sqlx, in-memory)
//! - Blob stores for snapshots (S3, local filesystem, in-memory)
//! - CSV event import and export
//! - CSV campaign revenue source
//!
//! ## Usage
//!
//! ```rust,ignore
//! use customer_analytics_common::AppConfig;
//! use customer_analytics_infrastructure::bootstrap;
//!
//! let config = AppConfig::load()?;
//! let events = bootstrap::connect_event_store(&config.event_store).await?;
//! let blobs = bootstrap::connect_blob_store(&config.snapshot_store).await?;
//! ```

pub mod bootstrap;
pub mod campaign;
pub mod database;
pub mod event_store;
pub mod ingest;
pub mod storage;

pub use campaign::CsvCampaignRevenue;
pub use database::{DatabaseConfig, DatabasePool, HealthStatus};
pub use event_store::{InMemoryEventStore, PgEventStore};
pub use ingest::{parse_events_csv, read_events_csv, write_events_csv, IngestReport};
pub use storage::{InMemoryBlobStore, LocalFsStorage, S3Storage, StorageConfig};

use customer_analytics_application::ApplicationError;

pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure-level errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database errors from sqlx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Storage errors from S3 operations
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout errors
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Error {
    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Database(e) => !matches!(
                e,
                sqlx::Error::RowNotFound | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_)
            ),
            Error::Storage(_) | Error::Io(_) | Error::Connection(_) | Error::Timeout(_) => true,
            _ => false,
        }
    }
}

impl From<Error> for ApplicationError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => ApplicationError::NotFound(msg),
            Error::Timeout(msg) => ApplicationError::Timeout(msg),
            Error::Serialization(e) => ApplicationError::Serialization(e.to_string()),
            Error::Configuration(msg) => ApplicationError::Internal(msg),
            Error::Csv(e) => ApplicationError::InvalidInput(e.to_string()),
            err if err.is_retryable() => ApplicationError::StoreUnavailable(err.to_string()),
            err => ApplicationError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        let db_err = Error::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let not_found = Error::NotFound("test".to_string());
        assert!(!not_found.is_retryable());

        assert!(!Error::Database(sqlx::Error::RowNotFound).is_retryable());
    }

    #[test]
    fn test_into_application_error() {
        let err: ApplicationError = Error::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(err, ApplicationError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        let err: ApplicationError = Error::Configuration("bad".to_string()).into();
        assert_eq!(err.http_status(), 500);

        let err: ApplicationError = Error::Timeout("slow".to_string()).into();
        assert_eq!(err.http_status(), 504);
    }
}
