//! Medialog Core Library
//!
//! This crate provides the domain models, configuration, and the sortable
//! time-key format that are shared across all Medialog components.

pub mod config;
pub mod models;
pub mod storage_types;
pub mod timefmt;

// Re-export commonly used types
pub use config::Config;
pub use models::{BatchMessage, BatchPayload, MediaEvent};
pub use storage_types::StorageBackend;
pub use timefmt::{format_timestamp, parse_timestamp};
