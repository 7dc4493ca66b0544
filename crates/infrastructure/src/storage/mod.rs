//! Storage module - blob stores for snapshots
//!
//! Implements the application's `BlobStore` port over AWS S3 (or compatible
//! services such as MinIO), a local directory, or process memory.

mod local;
mod memory;
mod s3;

pub use local::LocalFsStorage;
pub use memory::InMemoryBlobStore;
pub use s3::S3Storage;

use customer_analytics_common::config::SnapshotStoreConfig;

/// S3 storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3-compatible endpoint URL (for MinIO, R2, etc.)
    pub endpoint_url: Option<String>,
    pub region: String,
    pub bucket: String,
    /// Path prefix for all objects
    pub path_prefix: String,
    /// Force path-style access (required for MinIO)
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: "us-east-1".to_string(),
            bucket: "customer-analytics-processed".to_string(),
            path_prefix: String::new(),
            force_path_style: false,
        }
    }
}

impl From<&SnapshotStoreConfig> for StorageConfig {
    fn from(config: &SnapshotStoreConfig) -> Self {
        Self {
            // Custom endpoints are S3-compatible services that want path-style access
            force_path_style: config.endpoint.is_some(),
            endpoint_url: config.endpoint.clone(),
            region: config.region.clone(),
            bucket: config.bucket.clone(),
            path_prefix: config.prefix.clone().unwrap_or_default(),
        }
    }
}

/// Join an optional prefix and a key with a single `/`.
pub(crate) fn prefixed(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Strip a prefix added by [`prefixed`].
pub(crate) fn unprefixed<'a>(prefix: &str, full_key: &'a str) -> &'a str {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return full_key;
    }
    full_key
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(full_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_keys() {
        assert_eq!(prefixed("", "snapshots/LATEST.json"), "snapshots/LATEST.json");
        assert_eq!(prefixed("prod/", "a.json"), "prod/a.json");
        assert_eq!(unprefixed("prod", "prod/a.json"), "a.json");
        assert_eq!(unprefixed("", "a.json"), "a.json");
    }

    #[test]
    fn test_config_from_snapshot_store() {
        let config = SnapshotStoreConfig {
            endpoint: Some("http://localhost:9000".to_string()),
            prefix: Some("analytics".to_string()),
            ..Default::default()
        };
        let storage = StorageConfig::from(&config);
        assert!(storage.force_path_style);
        assert_eq!(storage.path_prefix, "analytics");
        assert_eq!(storage.bucket, "customer-analytics-processed");
    }
}
