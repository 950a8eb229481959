//! Grouping pipeline: drain, normalize, group by key, forward, acknowledge.
//!
//! One pass drains the activity queue, groups the surviving payloads by
//! logical key while preserving receive order, forwards one batch message
//! per key (keyed so a FIFO consumer sees per-key order across passes), and
//! deletes every received input message whether or not it produced output.
//! Malformed envelopes are dropped and deleted rather than retried forever;
//! only transport failures abort the pass.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;

use medialog_core::{BatchPayload, Config, MediaEvent};
use medialog_transport::{Message, OutboundMessage, Transport};

/// Field of the normalized payload naming the log partition it belongs to.
const KEY_FIELD: &str = "key";

#[derive(Clone)]
pub struct PipelineConfig {
    /// Cap on messages drained in one pass.
    pub receive_max_messages: usize,
    /// Total drain budget. Must stay below the visibility timeout so a
    /// message cannot reappear within the same pass.
    pub drain_budget: Duration,
    /// Long-poll wait per receive call.
    pub receive_wait: Duration,
    pub visibility_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_max_messages: 50,
            drain_budget: Duration::from_secs(30),
            receive_wait: Duration::from_secs(5),
            visibility_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            receive_max_messages: config.receive_max_messages,
            drain_budget: Duration::from_secs(config.drain_budget_secs),
            receive_wait: Duration::from_secs(config.receive_wait_secs),
            visibility_timeout: Duration::from_secs(config.visibility_timeout_secs),
        }
    }
}

/// Outcome of one pipeline pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Messages received from the activity queue, including ones that were
    /// dropped as malformed.
    pub received: usize,
    /// Batches forwarded, one per logical key.
    pub forwarded: usize,
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received {} messages, forwarded {} batches",
            self.received, self.forwarded
        )
    }
}

pub struct GroupingPipeline {
    input: Arc<dyn Transport>,
    output: Arc<dyn Transport>,
    config: PipelineConfig,
}

impl GroupingPipeline {
    pub fn new(
        input: Arc<dyn Transport>,
        output: Arc<dyn Transport>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            input,
            output,
            config,
        }
    }

    /// Run one pass over the activity queue.
    ///
    /// Transport failures (receive, send, delete) abort the pass and
    /// propagate; per-message parse and key-derivation failures are logged
    /// and the message is still deleted.
    pub async fn run_once(&self) -> Result<PipelineSummary> {
        let messages = self
            .drain()
            .await
            .context("receive from activity queue")?;
        let received = messages.len();

        // One batch per key, keys in first-seen order, events in receive order.
        let mut batches: Vec<(String, Vec<MediaEvent>)> = Vec::new();
        let mut batch_index: HashMap<String, usize> = HashMap::new();
        for message in &messages {
            let Some((key, event)) = normalize_message(message) else {
                continue;
            };
            let slot = *batch_index.entry(key.clone()).or_insert_with(|| {
                batches.push((key, Vec::new()));
                batches.len() - 1
            });
            batches[slot].1.push(event);
        }

        let forwarded = batches.len();
        let mut outbound = Vec::with_capacity(batches.len());
        for (key, records) in batches {
            let payload = BatchPayload {
                key: key.clone(),
                records,
            };
            let body = serde_json::to_string(&payload)
                .with_context(|| format!("serialize batch for key {}", key))?;
            outbound.push(OutboundMessage {
                group_key: key,
                body,
            });
        }

        if !outbound.is_empty() {
            self.output
                .send(outbound)
                .await
                .context("forward grouped batches")?;
        }

        // Every received message is consumed, parsed or not.
        if !messages.is_empty() {
            self.input
                .delete(&messages)
                .await
                .context("delete consumed activity messages")?;
        }

        let summary = PipelineSummary {
            received,
            forwarded,
        };
        tracing::info!(
            received = summary.received,
            forwarded = summary.forwarded,
            "grouping pipeline pass complete"
        );
        Ok(summary)
    }

    /// Receive until the message cap, an empty poll, or the drain budget.
    async fn drain(&self) -> Result<Vec<Message>, medialog_transport::TransportError> {
        let deadline = tokio::time::Instant::now() + self.config.drain_budget;
        let mut messages = Vec::new();

        while messages.len() < self.config.receive_max_messages {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                break;
            }
            let wait = self.config.receive_wait.min(deadline - now);
            let batch = self
                .input
                .receive(
                    wait,
                    self.config.receive_max_messages - messages.len(),
                    self.config.visibility_timeout,
                )
                .await?;
            if batch.is_empty() {
                break;
            }
            messages.extend(batch);
        }

        Ok(messages)
    }
}

/// Parse one raw envelope down to its logical key and event.
///
/// Returns `None` (and logs) for bodies that are not JSON, payloads without
/// a derivable key, and payloads that are not valid media events. The caller
/// still deletes such messages.
fn normalize_message(message: &Message) -> Option<(String, MediaEvent)> {
    let payload = match unwrap_envelope(&message.body) {
        Some(payload) => payload,
        None => {
            tracing::warn!(message_id = %message.id, "dropping envelope that is not valid JSON");
            return None;
        }
    };

    let Some(key) = payload
        .get(KEY_FIELD)
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
    else {
        tracing::warn!(message_id = %message.id, "dropping payload with no logical key");
        return None;
    };
    let key = key.to_string();

    match serde_json::from_value::<MediaEvent>(payload) {
        Ok(event) => Some((key, event)),
        Err(e) => {
            tracing::warn!(
                message_id = %message.id,
                error = %e,
                "dropping payload that is not a media event"
            );
            None
        }
    }
}

/// Parse an envelope body, unwrapping a notification wrapper (topic marker
/// plus stringified inner message) when present.
fn unwrap_envelope(body: &str) -> Option<Value> {
    let value: Value = serde_json::from_str(body).ok()?;
    if value.get("TopicArn").is_some() {
        let inner = value.get("Message").and_then(Value::as_str)?;
        return serde_json::from_str(inner).ok();
    }
    Some(value)
}
