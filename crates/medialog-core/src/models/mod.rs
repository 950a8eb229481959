pub mod batch;
pub mod event;

pub use batch::{BatchMessage, BatchPayload};
pub use event::MediaEvent;
