//! S3-compatible blob store.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Region, primitives::ByteStream, Client};
use bytes::Bytes;
use customer_analytics_application::ports::BlobStore;
use customer_analytics_application::ApplicationError;
use tracing::{debug, info, instrument, warn};

use super::{prefixed, unprefixed, StorageConfig};
use crate::{Error, Result};

/// S3-compatible storage implementation.
pub struct S3Storage {
    client: Client,
    bucket: String,
    path_prefix: String,
}

impl S3Storage {
    /// Create a new S3 storage instance using the default credential chain.
    #[instrument(skip(config), fields(bucket = %config.bucket, region = %config.region))]
    pub async fn new(config: StorageConfig) -> Result<Self> {
        info!("Initializing S3 storage");

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            config.bucket,
            config.path_prefix,
        ))
    }

    pub fn from_client(client: Client, bucket: String, path_prefix: String) -> Self {
        Self {
            client,
            bucket,
            path_prefix,
        }
    }

    fn full_key(&self, key: &str) -> String {
        prefixed(&self.path_prefix, key)
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .content_type("application/json")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("put {}: {}", key, e)))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await;

        let output = match response {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|s| s.is_no_such_key()) => return Ok(None),
            Err(e) => return Err(Error::Storage(format!("get {}: {}", key, e))),
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| Error::Storage(format!("read body of {}: {}", key, e)))?;
        Ok(Some(data.into_bytes()))
    }

    async fn head(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(Error::Storage(format!("head {}: {}", key, e))),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.full_key(key))
            .send()
            .await
            .map_err(|e| Error::Storage(format!("delete {}: {}", key, e)))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let full_prefix = self.full_key(prefix);
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix);
            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::Storage(format!("list {}: {}", prefix, e)))?;

            for object in response.contents() {
                if let Some(key) = object.key() {
                    keys.push(unprefixed(&self.path_prefix, key).to_string());
                }
            }

            if response.is_truncated().unwrap_or(false) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl BlobStore for S3Storage {
    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, size = bytes.len()))]
    async fn write(&self, key: &str, bytes: Bytes) -> std::result::Result<(), ApplicationError> {
        self.put(key, bytes).await?;
        debug!("Object written");
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn read(&self, key: &str) -> std::result::Result<Option<Bytes>, ApplicationError> {
        Ok(self.get(key).await?)
    }

    async fn exists(&self, key: &str) -> std::result::Result<bool, ApplicationError> {
        Ok(self.head(key).await?)
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), ApplicationError> {
        Ok(self.remove(key).await?)
    }

    async fn list(&self, prefix: &str) -> std::result::Result<Vec<String>, ApplicationError> {
        Ok(self.list_keys(prefix).await?)
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn health_check(&self) -> std::result::Result<(), ApplicationError> {
        let start = std::time::Instant::now();
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                debug!(latency_ms = start.elapsed().as_millis() as u64, "Storage health check passed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Storage health check failed");
                Err(Error::Storage(e.to_string()).into())
            }
        }
    }
}
