//! Medialog Append Log Library
//!
//! Maintains, per logical key, an ordered sequence of bounded-size gzip log
//! files plus a `.index` manifest describing their order, and appends new
//! media events to the current file of that sequence.

pub mod store;

pub use store::{
    decode_log_file, file_path, index_path, AppendLogError, AppendLogStore,
    DEFAULT_MAX_FILE_BYTES, LAST_EVENT_TIME_METADATA,
};
