//! Medialog Storage Library
//!
//! Blob store abstraction used by the append log store and the delivery
//! handler. The `BlobStore` trait covers the operations the log needs
//! (get/put/delete plus URL-to-key resolution for swapped-out payloads);
//! backends exist for S3 and for an in-memory store used in tests and the
//! manual CLI mode.
//!
//! # Object paths
//!
//! The append log keeps, per logical key, an index at `<key>/.index` and
//! gzip log files at `<key>/<fileId>.gz`. This crate treats paths as opaque
//! strings; the layout is owned by `medialog-applog`.

pub mod factory;
pub mod memory;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use medialog_core::StorageBackend;
pub use memory::MemoryStorage;
pub use s3::S3Storage;
pub use traits::{BlobStore, ObjectMetadata, StorageError, StorageResult};
