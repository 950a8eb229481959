//! Transport abstraction trait
//!
//! This module defines the Transport trait that all queue backends must
//! implement.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Transport operation errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// One message received from a queue. `receipt` is the backend's handle for
/// acknowledging (deleting) this delivery.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub receipt: String,
    pub body: String,
}

/// One message to send. `group_key` is the partition/ordering key: the
/// backend must deliver messages sharing a group key in send order, one
/// consumer at a time.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub group_key: String,
    pub body: String,
}

/// Queue abstraction trait
///
/// Backends are expected to provide at-least-once delivery: a received
/// message stays invisible for `visibility` and is redelivered unless
/// deleted in time.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Receive up to `max_messages`, waiting at most `max_wait` for the
    /// first to arrive. Backends may return fewer than requested.
    async fn receive(
        &self,
        max_wait: Duration,
        max_messages: usize,
        visibility: Duration,
    ) -> TransportResult<Vec<Message>>;

    /// Submit a set of messages in one send operation.
    async fn send(&self, messages: Vec<OutboundMessage>) -> TransportResult<()>;

    /// Acknowledge received messages so they are not delivered again.
    async fn delete(&self, messages: &[Message]) -> TransportResult<()>;
}
