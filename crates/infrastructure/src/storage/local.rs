//! Blob store over a local directory.

use async_trait::async_trait;
use bytes::Bytes;
use customer_analytics_application::ports::BlobStore;
use customer_analytics_application::ApplicationError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{Error, Result};

/// Stores each object as a file under `root`; `/` in keys maps to
/// subdirectories.
#[derive(Debug, Clone)]
pub struct LocalFsStorage {
    root: PathBuf,
}

impl LocalFsStorage {
    /// Open (creating if needed) the root directory.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        info!(root = %root.display(), "Using local snapshot directory");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(Error::Storage(format!("invalid object key '{}'", key)));
        }
        Ok(self.root.join(key))
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Readers never observe a partially written object
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, data).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.contains(".tmp-") {
                    continue;
                }
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl BlobStore for LocalFsStorage {
    async fn write(&self, key: &str, bytes: Bytes) -> std::result::Result<(), ApplicationError> {
        self.put(key, &bytes).await?;
        debug!(key, size = bytes.len(), "Object written");
        Ok(())
    }

    async fn read(&self, key: &str) -> std::result::Result<Option<Bytes>, ApplicationError> {
        Ok(self.get(key).await?)
    }

    async fn exists(&self, key: &str) -> std::result::Result<bool, ApplicationError> {
        Ok(tokio::fs::try_exists(self.path_for(key)?).await.map_err(Error::from)?)
    }

    async fn delete(&self, key: &str) -> std::result::Result<(), ApplicationError> {
        Ok(self.remove(key).await?)
    }

    async fn list(&self, prefix: &str) -> std::result::Result<Vec<String>, ApplicationError> {
        Ok(self.list_keys(prefix).await?)
    }

    async fn health_check(&self) -> std::result::Result<(), ApplicationError> {
        let metadata = tokio::fs::metadata(&self.root).await.map_err(Error::from)?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(Error::Storage(format!("{} is not a directory", self.root.display())).into())
        }
    }
}
