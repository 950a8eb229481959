//! Storage backend identifiers shared between configuration and the storage crate.

/// Supported blob store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Memory,
}
