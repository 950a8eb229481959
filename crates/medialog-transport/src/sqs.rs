use crate::traits::{Message, OutboundMessage, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use aws_sdk_sqs::types::{DeleteMessageBatchRequestEntry, SendMessageBatchRequestEntry};
use aws_sdk_sqs::Client;
use std::time::Duration;

/// SQS caps batch operations and a single receive at ten messages.
const SQS_BATCH_LIMIT: usize = 10;
/// SQS caps long-poll waits at twenty seconds.
const SQS_MAX_WAIT_SECS: u64 = 20;

/// SQS transport implementation
#[derive(Clone)]
pub struct SqsTransport {
    client: Client,
    queue_url: String,
}

impl SqsTransport {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }

    /// Create an SqsTransport from ambient AWS configuration (environment,
    /// profile, instance role).
    pub async fn from_env(queue_url: String) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), queue_url)
    }
}

#[async_trait]
impl Transport for SqsTransport {
    async fn receive(
        &self,
        max_wait: Duration,
        max_messages: usize,
        visibility: Duration,
    ) -> TransportResult<Vec<Message>> {
        let response = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .wait_time_seconds(max_wait.as_secs().min(SQS_MAX_WAIT_SECS) as i32)
            .max_number_of_messages(max_messages.clamp(1, SQS_BATCH_LIMIT) as i32)
            .visibility_timeout(visibility.as_secs() as i32)
            .send()
            .await
            .map_err(|e| TransportError::ReceiveFailed(e.to_string()))?;

        let messages: Vec<Message> = response
            .messages()
            .iter()
            .filter_map(|m| {
                Some(Message {
                    id: m.message_id()?.to_string(),
                    receipt: m.receipt_handle()?.to_string(),
                    body: m.body().unwrap_or_default().to_string(),
                })
            })
            .collect();

        tracing::debug!(
            queue = %self.queue_url,
            count = messages.len(),
            "received messages from SQS"
        );

        Ok(messages)
    }

    async fn send(&self, messages: Vec<OutboundMessage>) -> TransportResult<()> {
        for chunk in messages.chunks(SQS_BATCH_LIMIT) {
            let mut entries = Vec::with_capacity(chunk.len());
            for (i, message) in chunk.iter().enumerate() {
                let entry = SendMessageBatchRequestEntry::builder()
                    .id(format!("msg-{}", i))
                    .message_body(&message.body)
                    .message_group_id(&message.group_key)
                    .message_deduplication_id(uuid::Uuid::new_v4().to_string())
                    .build()
                    .map_err(|e| TransportError::SendFailed(e.to_string()))?;
                entries.push(entry);
            }

            let response = self
                .client
                .send_message_batch()
                .queue_url(&self.queue_url)
                .set_entries(Some(entries))
                .send()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;

            if !response.failed().is_empty() {
                return Err(TransportError::SendFailed(format!(
                    "{} of {} batch entries rejected",
                    response.failed().len(),
                    chunk.len()
                )));
            }
        }

        tracing::debug!(
            queue = %self.queue_url,
            count = messages.len(),
            "sent messages to SQS"
        );

        Ok(())
    }

    async fn delete(&self, messages: &[Message]) -> TransportResult<()> {
        for chunk in messages.chunks(SQS_BATCH_LIMIT) {
            let mut entries = Vec::with_capacity(chunk.len());
            for (i, message) in chunk.iter().enumerate() {
                let entry = DeleteMessageBatchRequestEntry::builder()
                    .id(format!("msg-{}", i))
                    .receipt_handle(&message.receipt)
                    .build()
                    .map_err(|e| TransportError::DeleteFailed(e.to_string()))?;
                entries.push(entry);
            }

            let response = self
                .client
                .delete_message_batch()
                .queue_url(&self.queue_url)
                .set_entries(Some(entries))
                .send()
                .await
                .map_err(|e| TransportError::DeleteFailed(e.to_string()))?;

            if !response.failed().is_empty() {
                return Err(TransportError::DeleteFailed(format!(
                    "{} of {} batch entries rejected",
                    response.failed().len(),
                    chunk.len()
                )));
            }
        }

        Ok(())
    }
}
