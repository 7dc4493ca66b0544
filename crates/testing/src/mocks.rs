//! Fake implementations of the store ports.
//!
//! In-memory stores with failure injection, so tests can exercise outages,
//! retries and slow reads without external services.

use async_trait::async_trait;
use bytes::Bytes;
use customer_analytics_application::ports::{BlobStore, CampaignRevenueSource, EventStore};
use customer_analytics_application::ApplicationError;
use customer_analytics_domain::EventRecord;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn unavailable(store: &str) -> ApplicationError {
    ApplicationError::StoreUnavailable(format!("{} unavailable (injected)", store))
}

/// Fake event store
#[derive(Default)]
pub struct FakeEventStore {
    records: RwLock<Vec<EventRecord>>,
    next_sequence: AtomicU64,
    /// Scans that fail before the store recovers
    failing_scans: AtomicU32,
    unavailable: AtomicBool,
    scan_delay: RwLock<Option<Duration>>,
    scan_calls: AtomicU32,
}

impl FakeEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`, keeping their sequence numbers.
    pub fn with_records(records: Vec<EventRecord>) -> Self {
        let store = Self::new();
        store.insert_raw(records);
        store
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Insert records without reassigning sequence numbers.
    pub fn insert_raw(&self, records: Vec<EventRecord>) {
        let max_seq = records.iter().map(|r| r.sequence).max().unwrap_or(0);
        self.next_sequence.fetch_max(max_seq, Ordering::SeqCst);
        self.records.write().extend(records);
    }

    /// Fail the next `n` scans with a retryable error.
    pub fn fail_next_scans(&self, n: u32) {
        self.failing_scans.store(n, Ordering::SeqCst);
    }

    /// Fail every call until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every scan, to exercise deadlines and concurrent triggers.
    pub fn set_scan_delay(&self, delay: Option<Duration>) {
        *self.scan_delay.write() = delay;
    }

    pub fn scan_calls(&self) -> u32 {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn check_available(&self) -> Result<(), ApplicationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("event store"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for FakeEventStore {
    async fn query_events(&self, customer_id: &str) -> Result<Vec<EventRecord>, ApplicationError> {
        self.check_available()?;
        let mut records: Vec<EventRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.timestamp, r.sequence));
        Ok(records)
    }

    async fn scan_all_events(&self) -> Result<Vec<EventRecord>, ApplicationError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.scan_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.check_available()?;
        let failing = self
            .failing_scans
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(unavailable("event store"));
        }

        Ok(self.records.read().clone())
    }

    async fn append(&self, records: Vec<EventRecord>) -> Result<u64, ApplicationError> {
        self.check_available()?;
        let count = records.len() as u64;
        let mut stored = self.records.write();
        for mut record in records {
            record.sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
            stored.push(record);
        }
        Ok(count)
    }

    async fn health_check(&self) -> Result<(), ApplicationError> {
        self.check_available()
    }
}

/// Fake blob store
#[derive(Default)]
pub struct FakeBlobStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
    fail_writes: AtomicBool,
    unavailable: AtomicBool,
    writes: AtomicU32,
}

impl FakeBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Reject every write until cleared.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    pub fn object_count(&self) -> usize {
        self.objects.read().len()
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().get(key).cloned()
    }

    /// Overwrite an object directly, bypassing failure injection.
    pub fn put(&self, key: &str, bytes: impl Into<Bytes>) {
        self.objects.write().insert(key.to_string(), bytes.into());
    }

    fn check_available(&self) -> Result<(), ApplicationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable("blob store"));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn write(&self, key: &str, bytes: Bytes) -> Result<(), ApplicationError> {
        self.check_available()?;
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable("blob store"));
        }
        self.objects.write().insert(key.to_string(), bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Bytes>, ApplicationError> {
        self.check_available()?;
        Ok(self.objects.read().get(key).cloned())
    }

    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        self.check_available()?;
        Ok(self.objects.read().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), ApplicationError> {
        self.check_available()?;
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ApplicationError> {
        self.check_available()?;
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), ApplicationError> {
        self.check_available()
    }
}

/// Campaign revenue from a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticCampaignRevenue {
    revenue: BTreeMap<String, Decimal>,
    /// Reads that panic before the source recovers
    panicking_reads: Arc<AtomicU32>,
}

impl StaticCampaignRevenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, customer_id: impl Into<String>, revenue: Decimal) -> Self {
        self.revenue.insert(customer_id.into(), revenue);
        self
    }

    /// Panic on the next `n` reads, to exercise passes that abort mid-flight.
    pub fn panic_next_reads(self, n: u32) -> Self {
        self.panicking_reads.store(n, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl CampaignRevenueSource for StaticCampaignRevenue {
    async fn campaign_revenue(&self) -> Result<BTreeMap<String, Decimal>, ApplicationError> {
        let panicking = self
            .panicking_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if panicking.is_ok() {
            panic!("campaign revenue source panicked (injected)");
        }
        Ok(self.revenue.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::EventBuilder;

    #[tokio::test]
    async fn test_append_assigns_increasing_sequences() {
        let store = FakeEventStore::new();
        store
            .append(vec![
                EventBuilder::new("C1").at(10).build(),
                EventBuilder::new("C1").at(10).build(),
            ])
            .await
            .unwrap();

        let events = store.query_events("C1").await.unwrap();
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[1].sequence, 2);
    }

    #[tokio::test]
    async fn test_injected_scan_failures_recover() {
        let store = FakeEventStore::new();
        store.fail_next_scans(2);

        assert!(store.scan_all_events().await.is_err());
        assert!(store.scan_all_events().await.is_err());
        assert!(store.scan_all_events().await.is_ok());
        assert_eq!(store.scan_calls(), 3);
    }

    #[tokio::test]
    async fn test_blob_store_failure_injection() {
        let blobs = FakeBlobStore::new();
        blobs.set_fail_writes(true);
        assert!(blobs.write("k", Bytes::from_static(b"v")).await.is_err());
        assert_eq!(blobs.write_count(), 0);

        blobs.set_fail_writes(false);
        blobs.write("k", Bytes::from_static(b"v")).await.unwrap();
        assert_eq!(blobs.read("k").await.unwrap(), Some(Bytes::from_static(b"v")));
        assert_eq!(blobs.list("").await.unwrap(), vec!["k".to_string()]);
    }
}
