use serde::{Deserialize, Serialize};

use super::event::MediaEvent;

/// Outbound batch produced by the grouping pipeline: all events observed for
/// one logical key in one pass, in receive order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayload {
    pub key: String,
    pub records: Vec<MediaEvent>,
}

/// Inbound shape accepted by the delivery handler.
///
/// Every field is optional: an oversized batch arrives as a bare
/// `payloadUrl` pointing at the swapped-out body in the blob store, and a
/// resolved or malformed body may lack records entirely. The handler decides
/// what to do based on which fields are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<MediaEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_url: Option<String>,
}
