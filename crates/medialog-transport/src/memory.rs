use crate::traits::{Message, OutboundMessage, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// In-memory queue used by tests and the manual CLI mode.
///
/// Delivery semantics are simplified: `receive` ignores the wait and
/// visibility arguments and moves messages into an in-flight set, where they
/// stay until deleted. Tests drive redelivery explicitly with
/// [`MemoryTransport::redeliver_inflight`].
#[derive(Default)]
pub struct MemoryTransport {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<Message>,
    inflight: HashMap<String, Message>,
    next_id: u64,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a raw message body, as an external producer would.
    pub fn push(&self, body: impl Into<String>) {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.queue.push_back(Message {
            id: format!("m-{}", id),
            receipt: format!("r-{}", id),
            body: body.into(),
        });
    }

    /// Move every undeleted in-flight message back to the head of the queue,
    /// as a visibility timeout expiry would.
    pub fn redeliver_inflight(&self) {
        let mut inner = self.lock();
        let mut messages: Vec<Message> = inner.inflight.drain().map(|(_, m)| m).collect();
        messages.sort_by_key(|m| {
            m.id.strip_prefix("m-")
                .and_then(|n| n.parse::<u64>().ok())
                .unwrap_or(u64::MAX)
        });
        for message in messages.into_iter().rev() {
            inner.queue.push_front(message);
        }
    }

    pub fn queued_len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn inflight_len(&self) -> usize {
        self.lock().inflight.len()
    }

    /// Bodies currently queued, in delivery order.
    pub fn queued_bodies(&self) -> Vec<String> {
        self.lock().queue.iter().map(|m| m.body.clone()).collect()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn receive(
        &self,
        _max_wait: Duration,
        max_messages: usize,
        _visibility: Duration,
    ) -> TransportResult<Vec<Message>> {
        let mut inner = self.lock();
        let mut received = Vec::new();
        while received.len() < max_messages {
            let Some(message) = inner.queue.pop_front() else {
                break;
            };
            inner
                .inflight
                .insert(message.receipt.clone(), message.clone());
            received.push(message);
        }
        Ok(received)
    }

    async fn send(&self, messages: Vec<OutboundMessage>) -> TransportResult<()> {
        let mut inner = self.lock();
        for message in messages {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.queue.push_back(Message {
                id: format!("m-{}", id),
                receipt: format!("r-{}", id),
                body: message.body,
            });
        }
        Ok(())
    }

    async fn delete(&self, messages: &[Message]) -> TransportResult<()> {
        let mut inner = self.lock();
        for message in messages {
            if inner.inflight.remove(&message.receipt).is_none() {
                return Err(TransportError::DeleteFailed(format!(
                    "unknown receipt: {}",
                    message.receipt
                )));
            }
        }
        Ok(())
    }
}
