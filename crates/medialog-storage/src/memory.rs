use crate::traits::{BlobStore, ObjectMetadata, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use medialog_core::StorageBackend;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, ObjectStore, ObjectStoreExt, PutOptions, PutPayload, Result as ObjectResult,
};
use std::borrow::Cow;
use std::sync::Arc;

/// URL scheme reported for in-memory objects.
const URL_PREFIX: &str = "memory://";

/// In-memory blob store used by tests and the manual CLI mode.
///
/// Backed by `object_store::memory::InMemory`, so it behaves like the S3
/// backend (replace-on-put, NotFound on missing keys) without network I/O.
#[derive(Clone)]
pub struct MemoryStorage {
    store: Arc<InMemory>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemory::new()),
        }
    }

    fn generate_url(key: &str) -> String {
        format!("{}{}", URL_PREFIX, key)
    }

    /// Public URL for an object, for building swapped-payload pointers in tests.
    pub fn url_for_key(&self, key: &str) -> String {
        Self::generate_url(key)
    }
}

#[async_trait]
impl BlobStore for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let location = Path::from(key.to_string());
        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DownloadFailed(other.to_string()),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: ObjectMetadata<'_>,
    ) -> StorageResult<()> {
        let location = Path::from(key.to_string());

        let mut opts = PutOptions::default();
        opts.attributes
            .insert(Attribute::ContentType, content_type.to_string().into());
        for (name, value) in metadata {
            opts.attributes.insert(
                Attribute::Metadata(Cow::Owned(name.to_string())),
                value.clone().into(),
            );
        }

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(Bytes::from(data)), opts)
            .await;

        result.map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = Path::from(key.to_string());
        let result: ObjectResult<_> = self.store.delete(&location).await;
        result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::DeleteFailed(other.to_string()),
        })?;
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(URL_PREFIX)
            .filter(|key| !key.is_empty())
            .map(String::from)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_round_trip() {
        let storage = MemoryStorage::new();
        storage
            .put("tenant/.index", b"file-1\n".to_vec(), "text/plain", &[])
            .await
            .unwrap();

        let bytes = storage.get("tenant/.index").await.unwrap();
        assert_eq!(bytes, b"file-1\n");

        storage.delete("tenant/.index").await.unwrap();
        let err = storage.get("tenant/.index").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let storage = MemoryStorage::new();
        let err = storage.get("nowhere").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn put_replaces_previous_contents() {
        let storage = MemoryStorage::new();
        storage
            .put("k", b"one".to_vec(), "text/plain", &[])
            .await
            .unwrap();
        storage
            .put("k", b"two".to_vec(), "text/plain", &[])
            .await
            .unwrap();
        assert_eq!(storage.get("k").await.unwrap(), b"two");
    }

    #[test]
    fn url_round_trip() {
        let storage = MemoryStorage::new();
        let url = storage.url_for_key("tenant/swap-1");
        assert_eq!(storage.key_for_url(&url).as_deref(), Some("tenant/swap-1"));
        assert_eq!(storage.key_for_url("https://elsewhere/x"), None);
    }
}
