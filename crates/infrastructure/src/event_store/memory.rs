//! Process-local event store.

use async_trait::async_trait;
use customer_analytics_application::ports::EventStore;
use customer_analytics_application::ApplicationError;
use customer_analytics_domain::EventRecord;
use parking_lot::RwLock;
use std::path::Path;
use tracing::info;

use crate::ingest::read_events_csv;
use crate::Result;

/// In-memory event store for development and single-process deployments
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<EventRecord>,
    last_sequence: u64,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded from a CSV export. Malformed rows are skipped.
    pub async fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let report = read_events_csv(path).await?;
        info!(
            path = %path.display(),
            parsed = report.parsed,
            malformed = report.malformed,
            "Seeding in-memory event store"
        );

        let store = Self::new();
        store.push(report.records);
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, records: Vec<EventRecord>) -> u64 {
        let mut inner = self.inner.write();
        let count = records.len() as u64;
        for mut record in records {
            inner.last_sequence += 1;
            record.sequence = inner.last_sequence;
            inner.records.push(record);
        }
        count
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn query_events(&self, customer_id: &str) -> std::result::Result<Vec<EventRecord>, ApplicationError> {
        let mut records: Vec<EventRecord> = self
            .inner
            .read()
            .records
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.timestamp, r.sequence));
        Ok(records)
    }

    async fn scan_all_events(&self) -> std::result::Result<Vec<EventRecord>, ApplicationError> {
        Ok(self.inner.read().records.clone())
    }

    async fn append(&self, records: Vec<EventRecord>) -> std::result::Result<u64, ApplicationError> {
        Ok(self.push(records))
    }

    async fn health_check(&self) -> std::result::Result<(), ApplicationError> {
        Ok(())
    }
}
