//! Medialog Worker Library
//!
//! The two invocation bodies of the system: the grouping pipeline, which
//! drains raw activity envelopes and emits one ordered batch per logical
//! key, and the delivery handler, which consumes those batches and appends
//! them to the per-key log. Each invocation runs to completion before the
//! next begins; there is no intra-invocation parallelism.

pub mod delivery;
pub mod pipeline;

pub use delivery::{DeliveryConfig, DeliveryHandler, DeliverySummary};
pub use pipeline::{GroupingPipeline, PipelineConfig, PipelineSummary};
