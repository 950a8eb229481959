//! Delivery handler: consume grouped batches and append them to the log.
//!
//! Each message carries one key's batch, either inline (`key` + `records`)
//! or as a pointer to a swapped-out body in the blob store when the batch
//! exceeded the transport's size limit. Messages are processed strictly
//! sequentially; each success is acknowledged on its own, and a failure is
//! recorded against that message only so the transport retries just that
//! batch.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use medialog_applog::AppendLogStore;
use medialog_core::{BatchMessage, Config};
use medialog_storage::BlobStore;
use medialog_transport::{Message, Transport};

/// Bound on swapped-payload indirection. A body pointing at a body pointing
/// at a body is already suspect; past this the batch is treated as empty.
const MAX_PAYLOAD_HOPS: usize = 3;

#[derive(Clone)]
pub struct DeliveryConfig {
    pub receive_max_messages: usize,
    pub receive_wait: Duration,
    pub visibility_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            receive_max_messages: 10,
            receive_wait: Duration::from_secs(5),
            visibility_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for DeliveryConfig {
    fn from(config: &Config) -> Self {
        Self {
            receive_max_messages: config.delivery_max_messages,
            receive_wait: Duration::from_secs(config.receive_wait_secs),
            visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
        }
    }
}

/// Outcome of one delivery pass. `failed_message_ids` names the messages
/// left unacknowledged for transport-level retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverySummary {
    pub received: usize,
    pub failed_message_ids: Vec<String>,
}

impl fmt::Display for DeliverySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivered {} of {} batch messages",
            self.received - self.failed_message_ids.len(),
            self.received
        )
    }
}

pub struct DeliveryHandler {
    transport: Arc<dyn Transport>,
    storage: Arc<dyn BlobStore>,
    store: AppendLogStore,
    config: DeliveryConfig,
}

impl DeliveryHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        storage: Arc<dyn BlobStore>,
        store: AppendLogStore,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            transport,
            storage,
            store,
            config,
        }
    }

    /// Run one pass over the batch queue.
    ///
    /// A receive failure aborts the pass; a failure processing one message
    /// is recorded in the summary and does not touch its siblings.
    pub async fn run_once(&self) -> Result<DeliverySummary> {
        let messages = self
            .transport
            .receive(
                self.config.receive_wait,
                self.config.receive_max_messages,
                self.config.visibility_timeout,
            )
            .await
            .context("receive from batch queue")?;

        let mut failed_message_ids = Vec::new();
        for message in &messages {
            match self.process_message(message).await {
                Ok(()) => {
                    self.transport
                        .delete(std::slice::from_ref(message))
                        .await
                        .with_context(|| format!("acknowledge batch message {}", message.id))?;
                }
                Err(e) => {
                    tracing::error!(
                        message_id = %message.id,
                        error = %format!("{:#}", e),
                        "failed to deliver batch message"
                    );
                    failed_message_ids.push(message.id.clone());
                }
            }
        }

        let summary = DeliverySummary {
            received: messages.len(),
            failed_message_ids,
        };
        tracing::info!(
            received = summary.received,
            failed = summary.failed_message_ids.len(),
            "delivery pass complete"
        );
        Ok(summary)
    }

    /// Process one batch message: resolve swapped-payload indirection,
    /// append the records, then clean up any swapped blobs.
    ///
    /// A fetch failure on a swapped payload degrades to "no records"; only
    /// the append itself can fail the message.
    pub async fn process_message(&self, message: &Message) -> Result<()> {
        let mut batch: BatchMessage = match serde_json::from_str(&message.body) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(
                    message_id = %message.id,
                    error = %e,
                    "dropping batch message that is not valid JSON"
                );
                return Ok(());
            }
        };

        let mut swapped_blobs = Vec::new();
        let mut hops = 0;
        while let Some(url) = batch.payload_url.take() {
            hops += 1;
            if hops > MAX_PAYLOAD_HOPS {
                tracing::warn!(
                    message_id = %message.id,
                    "swapped payload nested more than {} deep, treating as empty",
                    MAX_PAYLOAD_HOPS
                );
                batch.records = None;
                break;
            }
            match self.fetch_swapped(&url).await {
                Ok((blob_key, inner)) => {
                    swapped_blobs.push(blob_key);
                    batch = inner;
                }
                Err(e) => {
                    tracing::warn!(
                        message_id = %message.id,
                        url = %url,
                        error = %format!("{:#}", e),
                        "failed to fetch swapped payload, skipping records"
                    );
                    batch.records = None;
                    break;
                }
            }
        }

        match (batch.key.as_deref(), batch.records.as_deref()) {
            (Some(key), Some(records)) if !records.is_empty() => {
                let file_ref = self
                    .store
                    .append(key, records)
                    .await
                    .with_context(|| format!("append batch for key {}", key))?;
                if let Some(file_ref) = file_ref {
                    tracing::info!(
                        message_id = %message.id,
                        key = %key,
                        file = %file_ref,
                        records = records.len(),
                        "batch appended"
                    );
                }
            }
            _ => {
                tracing::warn!(
                    message_id = %message.id,
                    "batch message has no key or records, nothing to append"
                );
            }
        }

        // Swapped bodies are only needed for retries, which cannot happen
        // once the append above has succeeded.
        for blob_key in swapped_blobs {
            if let Err(e) = self.storage.delete(&blob_key).await {
                tracing::warn!(
                    blob_key = %blob_key,
                    error = %e,
                    "failed to delete swapped payload blob"
                );
            }
        }

        Ok(())
    }

    async fn fetch_swapped(&self, url: &str) -> Result<(String, BatchMessage)> {
        let blob_key = self
            .storage
            .key_for_url(url)
            .ok_or_else(|| anyhow!("url does not map into the blob store: {}", url))?;
        let data = self
            .storage
            .get(&blob_key)
            .await
            .with_context(|| format!("fetch swapped payload {}", blob_key))?;
        let inner: BatchMessage = serde_json::from_slice(&data)
            .with_context(|| format!("parse swapped payload {}", blob_key))?;
        Ok((blob_key, inner))
    }
}
