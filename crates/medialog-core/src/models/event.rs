use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One media action observed by a producer.
///
/// Events are immutable once created; the pipeline and log store only ever
/// read them. `operation` is an open set of lowercase verbs (`ingest`,
/// `reuse`, `delete`, ...) kept as a plain string so unknown operations
/// survive the append path unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEvent {
    /// When the action happened. Drives per-file `last-event-time` metadata.
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    /// Content-addressable identifier of the media object.
    pub media_hash: String,
    pub content_type: String,
    pub user: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_source_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_payload() {
        let event: MediaEvent = serde_json::from_str(
            r#"{
                "timestamp": "2024-03-07T09:05:02Z",
                "operation": "ingest",
                "mediaHash": "abc123",
                "contentType": "image/png",
                "user": "alice",
                "path": "photos/cat.png",
                "originalFilename": "cat.png"
            }"#,
        )
        .unwrap();
        assert_eq!(event.operation, "ingest");
        assert_eq!(event.media_hash, "abc123");
        assert_eq!(event.original_filename.as_deref(), Some("cat.png"));
        assert_eq!(event.content_source_type, None);
    }

    #[test]
    fn unknown_operations_survive_round_trip() {
        let event: MediaEvent = serde_json::from_str(
            r#"{
                "timestamp": "2024-03-07T09:05:02Z",
                "operation": "transcode",
                "mediaHash": "h",
                "contentType": "video/mp4",
                "user": "bob",
                "path": "v.mp4"
            }"#,
        )
        .unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["operation"], "transcode");
        assert!(json.get("originalFilename").is_none());
    }
}
