//! Configuration module
//!
//! Environment-driven configuration for the pipeline, delivery handler, and
//! the append log store. Values are read once at startup and handed to each
//! component at construction; nothing reads process-wide state afterwards.

use std::env;

use crate::storage_types::StorageBackend;

// Defaults
const RECEIVE_MAX_MESSAGES: usize = 50;
const DRAIN_BUDGET_SECS: u64 = 30;
const RECEIVE_WAIT_SECS: u64 = 5;
const VISIBILITY_TIMEOUT_SECS: u64 = 60;
const DELIVERY_MAX_MESSAGES: usize = 10;
const LOG_FILE_MAX_BYTES: usize = 512 * 1024;

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    // Queues
    pub activity_queue_url: Option<String>,
    pub batch_queue_url: Option<String>,
    // Storage
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub aws_region: Option<String>,
    // Pipeline tuning
    pub receive_max_messages: usize,
    pub drain_budget_secs: u64,
    pub receive_wait_secs: u64,
    pub visibility_timeout_secs: u64,
    pub delivery_max_messages: usize,
    // Log store tuning
    pub log_file_max_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let storage_backend =
            env::var("STORAGE_BACKEND")
                .ok()
                .and_then(|s| match s.to_lowercase().as_str() {
                    "s3" => Some(StorageBackend::S3),
                    "memory" => Some(StorageBackend::Memory),
                    _ => None,
                });

        let config = Config {
            activity_queue_url: env::var("ACTIVITY_QUEUE_URL").ok().filter(|s| !s.is_empty()),
            batch_queue_url: env::var("BATCH_QUEUE_URL").ok().filter(|s| !s.is_empty()),
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            receive_max_messages: env::var("RECEIVE_MAX_MESSAGES")
                .unwrap_or_else(|_| RECEIVE_MAX_MESSAGES.to_string())
                .parse()
                .unwrap_or(RECEIVE_MAX_MESSAGES),
            drain_budget_secs: env::var("DRAIN_BUDGET_SECS")
                .unwrap_or_else(|_| DRAIN_BUDGET_SECS.to_string())
                .parse()
                .unwrap_or(DRAIN_BUDGET_SECS),
            receive_wait_secs: env::var("RECEIVE_WAIT_SECS")
                .unwrap_or_else(|_| RECEIVE_WAIT_SECS.to_string())
                .parse()
                .unwrap_or(RECEIVE_WAIT_SECS),
            visibility_timeout_secs: env::var("VISIBILITY_TIMEOUT_SECS")
                .unwrap_or_else(|_| VISIBILITY_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(VISIBILITY_TIMEOUT_SECS),
            delivery_max_messages: env::var("DELIVERY_MAX_MESSAGES")
                .unwrap_or_else(|_| DELIVERY_MAX_MESSAGES.to_string())
                .parse()
                .unwrap_or(DELIVERY_MAX_MESSAGES),
            log_file_max_bytes: env::var("LOG_FILE_MAX_BYTES")
                .unwrap_or_else(|_| LOG_FILE_MAX_BYTES.to_string())
                .parse()
                .unwrap_or(LOG_FILE_MAX_BYTES),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        // A drain budget at or above the visibility window re-delivers
        // messages into the same invocation. Refuse to start that way.
        if self.drain_budget_secs >= self.visibility_timeout_secs {
            return Err(anyhow::anyhow!(
                "DRAIN_BUDGET_SECS ({}) must be strictly less than VISIBILITY_TIMEOUT_SECS ({})",
                self.drain_budget_secs,
                self.visibility_timeout_secs
            ));
        }

        if self.log_file_max_bytes == 0 {
            return Err(anyhow::anyhow!("LOG_FILE_MAX_BYTES must be greater than zero"));
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::S3);
        if backend == StorageBackend::S3 {
            if self.s3_bucket.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_BUCKET must be set when using the S3 storage backend"
                ));
            }
            if self.s3_region.is_none() && self.aws_region.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_REGION or AWS_REGION must be set when using the S3 storage backend"
                ));
            }
        }

        Ok(())
    }

    // Convenience getters for common fields
    pub fn activity_queue_url(&self) -> Option<&str> {
        self.activity_queue_url.as_deref()
    }

    pub fn batch_queue_url(&self) -> Option<&str> {
        self.batch_queue_url.as_deref()
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }

    pub fn aws_region(&self) -> Option<&str> {
        self.aws_region.as_deref()
    }
}
