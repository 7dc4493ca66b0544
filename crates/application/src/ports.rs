//! Ports to external collaborators.
//!
//! The engine reads events from an [`EventStore`], persists snapshots to a
//! [`BlobStore`] and optionally reads attributed revenue from a
//! [`CampaignRevenueSource`]. Adapters live in the infrastructure crate.

use crate::ApplicationError;
use async_trait::async_trait;
use bytes::Bytes;
use customer_analytics_domain::EventRecord;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Append-only store of customer events keyed by (customer_id, timestamp).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events of one customer, ordered by (timestamp, sequence).
    async fn query_events(&self, customer_id: &str) -> Result<Vec<EventRecord>, ApplicationError>;

    /// Every stored event, in no particular order.
    async fn scan_all_events(&self) -> Result<Vec<EventRecord>, ApplicationError>;

    /// Append records, assigning each a fresh sequence number.
    ///
    /// Used by ingestion tooling only. Returns the number of records stored.
    async fn append(&self, records: Vec<EventRecord>) -> Result<u64, ApplicationError>;

    async fn health_check(&self) -> Result<(), ApplicationError>;
}

/// Object storage for serialized snapshots.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn write(&self, key: &str, bytes: Bytes) -> Result<(), ApplicationError>;

    /// Read an object; `None` when the key does not exist.
    async fn read(&self, key: &str) -> Result<Option<Bytes>, ApplicationError>;

    async fn exists(&self, key: &str) -> Result<bool, ApplicationError>;

    async fn delete(&self, key: &str) -> Result<(), ApplicationError>;

    /// Keys under `prefix`, sorted ascending.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ApplicationError>;

    async fn health_check(&self) -> Result<(), ApplicationError>;
}

/// External per-customer revenue attributed to campaigns.
#[async_trait]
pub trait CampaignRevenueSource: Send + Sync {
    /// Campaign revenue keyed by customer id. Absent customers have none.
    async fn campaign_revenue(&self) -> Result<BTreeMap<String, Decimal>, ApplicationError>;
}

/// Source used when no campaign revenue is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCampaignRevenue;

#[async_trait]
impl CampaignRevenueSource for NoCampaignRevenue {
    async fn campaign_revenue(&self) -> Result<BTreeMap<String, Decimal>, ApplicationError> {
        Ok(BTreeMap::new())
    }
}
