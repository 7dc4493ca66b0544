use async_trait::async_trait;
use bytes::Bytes;
use customer_analytics_application::ports::BlobStore;
use customer_analytics_application::ApplicationError;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Blob store held in process memory. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    objects: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn write(&self, key: &str, bytes: Bytes) -> Result<(), ApplicationError> {
        self.objects.write().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<Bytes>, ApplicationError> {
        Ok(self.objects.read().get(key).cloned())
    }

    async fn exists(&self, key: &str) -> Result<bool, ApplicationError> {
        Ok(self.objects.read().contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<(), ApplicationError> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ApplicationError> {
        Ok(self
            .objects
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), ApplicationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_sorted_and_filtered() {
        let store = InMemoryBlobStore::new();
        store.write("snapshots/b", Bytes::from_static(b"2")).await.unwrap();
        store.write("snapshots/a", Bytes::from_static(b"1")).await.unwrap();
        store.write("misc/c", Bytes::from_static(b"3")).await.unwrap();

        assert_eq!(store.list("snapshots/").await.unwrap(), vec!["snapshots/a", "snapshots/b"]);

        store.delete("snapshots/a").await.unwrap();
        assert!(!store.exists("snapshots/a").await.unwrap());
        assert_eq!(store.len(), 2);
    }
}
