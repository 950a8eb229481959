//! Blob store abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must
//! implement.

use async_trait::async_trait;
use medialog_core::StorageBackend;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// True for the "object does not exist" case, which callers routinely
    /// treat as an empty read rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key/value metadata attached to a stored object.
pub type ObjectMetadata<'a> = &'a [(&'a str, String)];

/// Blob store abstraction trait
///
/// All backends (S3, in-memory) must implement this trait so the append log
/// store and delivery handler work against any of them without coupling to
/// implementation details.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download an object. Returns [`StorageError::NotFound`] when the key
    /// does not exist.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Upload an object, replacing any previous contents, with the given
    /// content type and metadata attributes.
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
        metadata: ObjectMetadata<'_>,
    ) -> StorageResult<()>;

    /// Delete an object by key.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Map a public URL produced by this backend back to an object key.
    ///
    /// Used to resolve swapped-out payload pointers. Returns `None` when the
    /// URL does not point into this store.
    fn key_for_url(&self, url: &str) -> Option<String>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
