//! Snapshot Store Adapter
//!
//! Persists [`SnapshotRecord`]s to a blob store. Each record is written under
//! a fresh versioned key, and only then is the `LATEST` pointer moved to it.
//! Readers always go through the pointer, so they never observe a partially
//! written snapshot.
//!
//! The pointer never moves backwards: a record whose sequence or reference
//! time is older than the current latest is refused before anything is
//! written.

use crate::ports::BlobStore;
use crate::ApplicationError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use customer_analytics_domain::{RunId, SnapshotRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const SNAPSHOT_PREFIX: &str = "snapshots/";
const POINTER_KEY: &str = "snapshots/LATEST.json";

/// Contents of the `LATEST` pointer object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPointer {
    pub sequence: u64,
    pub run_id: RunId,
    pub key: String,
    /// Reference time of the pass that produced the snapshot
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

impl SnapshotPointer {
    /// Why `record` may not replace this pointer, if it may not.
    fn supersede_conflict(&self, record: &SnapshotRecord) -> Option<String> {
        if record.sequence <= self.sequence {
            return Some(format!(
                "sequence {} is not newer than the latest sequence {}",
                record.sequence, self.sequence
            ));
        }
        match self.now {
            Some(latest_now) if record.now < latest_now => Some(format!(
                "pass at {} is older than the latest snapshot at {}",
                record.now, latest_now
            )),
            _ => None,
        }
    }
}

/// Versioned snapshot persistence
#[derive(Clone)]
pub struct SnapshotStore {
    blobs: Arc<dyn BlobStore>,
}

impl SnapshotStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Key of the body of a snapshot version.
    pub fn body_key(sequence: u64, run_id: &RunId) -> String {
        format!("{}{:020}-{}.json", SNAPSHOT_PREFIX, sequence, run_id)
    }

    pub fn pointer_key() -> &'static str {
        POINTER_KEY
    }

    /// Persist a snapshot and make it the latest. Returns the body key.
    ///
    /// Fails with [`ApplicationError::SnapshotConflict`], writing nothing,
    /// when the current latest snapshot is newer than `record`.
    #[instrument(skip(self, record), fields(run_id = %record.run_id, sequence = record.sequence))]
    pub async fn save(&self, record: &SnapshotRecord) -> Result<String, ApplicationError> {
        if let Some(latest) = self.latest_pointer().await? {
            if let Some(reason) = latest.supersede_conflict(record) {
                warn!(latest_run_id = %latest.run_id, %reason, "Refusing to move snapshot pointer backwards");
                return Err(ApplicationError::SnapshotConflict(reason));
            }
        }

        let key = Self::body_key(record.sequence, &record.run_id);
        let body = serde_json::to_vec(record)?;
        let pointer = serde_json::to_vec(&SnapshotPointer {
            sequence: record.sequence,
            run_id: record.run_id,
            key: key.clone(),
            now: Some(record.now),
        })?;

        self.blobs.write(&key, Bytes::from(body)).await?;
        self.blobs.write(POINTER_KEY, Bytes::from(pointer)).await?;

        info!(key = %key, customers = record.customers.len(), "Snapshot saved");
        Ok(key)
    }

    /// The pointer to the latest snapshot, if any pass has completed.
    pub async fn latest_pointer(&self) -> Result<Option<SnapshotPointer>, ApplicationError> {
        match self.blobs.read(POINTER_KEY).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Load the latest snapshot. `None` means nothing has been computed yet.
    #[instrument(skip(self))]
    pub async fn load_latest(&self) -> Result<Option<SnapshotRecord>, ApplicationError> {
        let Some(pointer) = self.latest_pointer().await? else {
            debug!("No snapshot pointer present");
            return Ok(None);
        };

        let bytes = self.blobs.read(&pointer.key).await?.ok_or_else(|| {
            ApplicationError::Internal(format!(
                "Snapshot pointer references missing object {}",
                pointer.key
            ))
        })?;

        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub async fn latest_sequence(&self) -> Result<Option<u64>, ApplicationError> {
        Ok(self.latest_pointer().await?.map(|p| p.sequence))
    }

    /// Version number for the next snapshot.
    pub async fn next_sequence(&self) -> Result<u64, ApplicationError> {
        Ok(self.latest_sequence().await?.map_or(1, |s| s + 1))
    }

    /// Body keys of every stored snapshot version, oldest first.
    pub async fn versions(&self) -> Result<Vec<String>, ApplicationError> {
        let keys = self.blobs.list(SNAPSHOT_PREFIX).await?;
        Ok(keys.into_iter().filter(|k| k != POINTER_KEY).collect())
    }

    pub async fn health_check(&self) -> Result<(), ApplicationError> {
        self.blobs.health_check().await
    }
}
