//! Medialog Transport Library
//!
//! Queue abstraction for the two message flows: raw activity envelopes in,
//! grouped per-key batches out. The `Transport` trait mirrors the three
//! operations the pipeline needs (receive, send, delete); backends exist
//! for SQS and for an in-memory queue used in tests and the manual CLI
//! mode.

pub mod memory;
#[cfg(feature = "transport-sqs")]
pub mod sqs;
pub mod traits;

// Re-export commonly used types
pub use memory::MemoryTransport;
#[cfg(feature = "transport-sqs")]
pub use sqs::SqsTransport;
pub use traits::{Message, OutboundMessage, Transport, TransportError, TransportResult};
