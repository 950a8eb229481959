//! Per-key append log over a blob store.
//!
//! Layout, per logical key:
//!
//! - `<key>/.index`: newline-joined list of log file ids, oldest first.
//!   The last entry is the only file eligible to receive new appends.
//! - `<key>/<fileId>.gz`: gzip-wrapped UTF-8 JSON array of media events in
//!   append order. `fileId` is the creation time key plus a random suffix,
//!   so lexicographic order of ids matches creation order.
//!
//! Appending is a whole-file read-modify-write: the current file is
//! decompressed, extended, recompressed, and stored back under the same id.
//! A file whose stored uncompressed size has reached the threshold is left
//! alone and a fresh file is started; the index gains the new id before the
//! file's first contents are written, so a reader can always discover every
//! file that may exist.
//!
//! The store performs no conditional writes. Single-writer-per-key is an
//! assumption delegated to the transport's group ordering; unsynchronized
//! concurrent appends to one key can lose records (last writer wins).

use std::io::{Read, Write};
use std::sync::Arc;

use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rand::distr::{Alphanumeric, SampleString};
use thiserror::Error;

use medialog_core::{format_timestamp, MediaEvent};
use medialog_storage::{BlobStore, StorageError};

/// Uncompressed size at which the current file stops accepting appends.
pub const DEFAULT_MAX_FILE_BYTES: usize = 512 * 1024;

/// Metadata attribute recording the timestamp of the newest event appended
/// to a log file.
pub const LAST_EVENT_TIME_METADATA: &str = "last-event-time";

const INDEX_FILENAME: &str = ".index";
const FILE_ID_SUFFIX_LEN: usize = 8;

/// Append log operation errors
#[derive(Debug, Error)]
pub enum AppendLogError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("object {path} is malformed: {reason}")]
    Malformed { path: String, reason: String },

    #[error("failed to serialize records: {0}")]
    Serialize(serde_json::Error),

    #[error("gzip error: {0}")]
    Gzip(#[from] std::io::Error),
}

/// Storage path of the index manifest for a logical key.
pub fn index_path(key: &str) -> String {
    format!("{}/{}", key, INDEX_FILENAME)
}

/// Storage path of one log file for a logical key.
pub fn file_path(key: &str, file_id: &str) -> String {
    format!("{}/{}.gz", key, file_id)
}

/// Decode a stored log file back into its events.
pub fn decode_log_file(data: &[u8]) -> Result<Vec<MediaEvent>, AppendLogError> {
    let json = gunzip(data)?;
    serde_json::from_slice(&json).map_err(|e| AppendLogError::Malformed {
        path: "<log file>".to_string(),
        reason: e.to_string(),
    })
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data).read_to_end(&mut out)?;
    Ok(out)
}

/// Per-key compressed append log.
pub struct AppendLogStore {
    storage: Arc<dyn BlobStore>,
    max_file_bytes: usize,
}

impl AppendLogStore {
    pub fn new(storage: Arc<dyn BlobStore>, max_file_bytes: usize) -> Self {
        Self {
            storage,
            max_file_bytes,
        }
    }

    /// Durably append `records` to the log for `key`, in order.
    ///
    /// Returns the storage path of the file that received the records, or
    /// `None` for an empty input, which touches the blob store not at all.
    /// A missing index or missing current file means "nothing there yet";
    /// every other storage error propagates to the caller.
    pub async fn append(
        &self,
        key: &str,
        records: &[MediaEvent],
    ) -> Result<Option<String>, AppendLogError> {
        let Some(last_record) = records.last() else {
            return Ok(None);
        };

        let mut index = self.load_index(key).await?;

        // The last-listed file keeps accepting records until the size it was
        // last stored at reaches the threshold. One append may push it over;
        // the next append is what rotates.
        let mut existing: Vec<MediaEvent> = Vec::new();
        let mut current_id: Option<String> = None;
        if let Some(last_id) = index.last() {
            let path = file_path(key, last_id);
            match self.storage.get(&path).await {
                Ok(data) => {
                    let json = gunzip(&data)?;
                    if json.len() < self.max_file_bytes {
                        existing =
                            serde_json::from_slice(&json).map_err(|e| AppendLogError::Malformed {
                                path: path.clone(),
                                reason: e.to_string(),
                            })?;
                        current_id = Some(last_id.clone());
                    }
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(key = %key, file_id = %last_id, "indexed log file missing, starting a new one");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let file_id = match current_id {
            Some(id) => id,
            None => {
                let id = new_file_id();
                index.push(id.clone());
                // Persisting the index first makes the new file discoverable
                // before any of its contents exist.
                self.store_index(key, &index).await?;
                id
            }
        };

        existing.extend_from_slice(records);
        let json = serde_json::to_vec(&existing).map_err(AppendLogError::Serialize)?;
        let compressed = gzip(&json)?;

        let path = file_path(key, &file_id);
        let last_event_time = format_timestamp(last_record.timestamp);
        self.storage
            .put(
                &path,
                compressed,
                "application/gzip",
                &[(LAST_EVENT_TIME_METADATA, last_event_time)],
            )
            .await?;

        tracing::info!(
            key = %key,
            file = %path,
            appended = records.len(),
            total = existing.len(),
            "appended records to log file"
        );

        Ok(Some(path))
    }

    async fn load_index(&self, key: &str) -> Result<Vec<String>, AppendLogError> {
        let path = index_path(key);
        let data = match self.storage.get(&path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8(data).map_err(|e| AppendLogError::Malformed {
            path,
            reason: e.to_string(),
        })?;
        Ok(text
            .lines()
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    async fn store_index(&self, key: &str, file_ids: &[String]) -> Result<(), AppendLogError> {
        let body = file_ids.join("\n");
        self.storage
            .put(&index_path(key), body.into_bytes(), "text/plain", &[])
            .await?;
        Ok(())
    }
}

fn new_file_id() -> String {
    let suffix = Alphanumeric
        .sample_string(&mut rand::rng(), FILE_ID_SUFFIX_LEN)
        .to_lowercase();
    format!("{}-{}", format_timestamp(Utc::now()), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use medialog_storage::{MemoryStorage, StorageResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn event(n: u32) -> MediaEvent {
        MediaEvent {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 7, 9, 0, n).unwrap(),
            operation: "ingest".to_string(),
            media_hash: format!("hash-{}", n),
            content_type: "image/png".to_string(),
            user: "alice".to_string(),
            path: format!("photos/{}.png", n),
            original_filename: None,
            content_source_type: None,
        }
    }

    /// Wraps a backend and records every call, for asserting call counts and
    /// write ordering.
    struct RecordingStore {
        inner: MemoryStorage,
        calls: AtomicUsize,
        writes: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStorage::new(),
                calls: AtomicUsize::new(0),
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl BlobStore for RecordingStore {
        async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn put(
            &self,
            key: &str,
            data: Vec<u8>,
            content_type: &str,
            metadata: medialog_storage::ObjectMetadata<'_>,
        ) -> StorageResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.writes.lock().unwrap().push(key.to_string());
            self.inner.put(key, data, content_type, metadata).await
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(key).await
        }

        fn key_for_url(&self, url: &str) -> Option<String> {
            self.inner.key_for_url(url)
        }

        fn backend_type(&self) -> medialog_core::StorageBackend {
            self.inner.backend_type()
        }
    }

    async fn read_index(storage: &dyn BlobStore, key: &str) -> Vec<String> {
        let data = storage.get(&index_path(key)).await.unwrap();
        String::from_utf8(data)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    async fn read_file(storage: &dyn BlobStore, key: &str, file_id: &str) -> Vec<MediaEvent> {
        let data = storage.get(&file_path(key, file_id)).await.unwrap();
        decode_log_file(&data).unwrap()
    }

    #[tokio::test]
    async fn empty_append_is_a_noop_with_zero_storage_calls() {
        let storage = Arc::new(RecordingStore::new());
        let store = AppendLogStore::new(storage.clone(), DEFAULT_MAX_FILE_BYTES);

        let result = store.append("tenant-1", &[]).await.unwrap();

        assert_eq!(result, None);
        assert_eq!(storage.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_append_creates_index_and_file() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AppendLogStore::new(storage.clone(), DEFAULT_MAX_FILE_BYTES);

        let file_ref = store
            .append("tenant-1", &[event(1), event(2)])
            .await
            .unwrap()
            .unwrap();

        let index = read_index(storage.as_ref(), "tenant-1").await;
        assert_eq!(index.len(), 1);
        assert_eq!(file_ref, file_path("tenant-1", &index[0]));

        let events = read_file(storage.as_ref(), "tenant-1", &index[0]).await;
        assert_eq!(events, vec![event(1), event(2)]);
    }

    #[tokio::test]
    async fn index_is_written_before_the_new_file() {
        let storage = Arc::new(RecordingStore::new());
        let store = AppendLogStore::new(storage.clone(), DEFAULT_MAX_FILE_BYTES);

        store.append("tenant-1", &[event(1)]).await.unwrap();

        let writes = storage.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], index_path("tenant-1"));
        assert!(writes[1].ends_with(".gz"));
    }

    #[tokio::test]
    async fn appends_accumulate_in_order_across_calls() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AppendLogStore::new(storage.clone(), DEFAULT_MAX_FILE_BYTES);

        store.append("tenant-1", &[event(1), event(2)]).await.unwrap();
        store.append("tenant-1", &[event(3)]).await.unwrap();

        let index = read_index(storage.as_ref(), "tenant-1").await;
        assert_eq!(index.len(), 1);
        let events = read_file(storage.as_ref(), "tenant-1", &index[0]).await;
        assert_eq!(events, vec![event(1), event(2), event(3)]);
    }

    #[tokio::test]
    async fn file_at_threshold_rotates_on_next_append() {
        let storage = Arc::new(MemoryStorage::new());
        // Threshold below the size of a single serialized event: every
        // append lands in a fresh file.
        let store = AppendLogStore::new(storage.clone(), 16);

        store.append("tenant-1", &[event(1)]).await.unwrap();
        store.append("tenant-1", &[event(2)]).await.unwrap();

        let index = read_index(storage.as_ref(), "tenant-1").await;
        assert_eq!(index.len(), 2);
        assert_eq!(
            read_file(storage.as_ref(), "tenant-1", &index[0]).await,
            vec![event(1)]
        );
        assert_eq!(
            read_file(storage.as_ref(), "tenant-1", &index[1]).await,
            vec![event(2)]
        );
    }

    #[tokio::test]
    async fn file_below_threshold_is_reused() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AppendLogStore::new(storage.clone(), DEFAULT_MAX_FILE_BYTES);

        let first = store.append("tenant-1", &[event(1)]).await.unwrap().unwrap();
        let second = store.append("tenant-1", &[event(2)]).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(read_index(storage.as_ref(), "tenant-1").await.len(), 1);
    }

    #[tokio::test]
    async fn missing_indexed_file_is_treated_as_absent() {
        let storage = Arc::new(MemoryStorage::new());
        // Index lists a file that was never written.
        storage
            .put(
                &index_path("tenant-1"),
                b"2024-01-01-00-00-00-deadbeef".to_vec(),
                "text/plain",
                &[],
            )
            .await
            .unwrap();

        let store = AppendLogStore::new(storage.clone(), DEFAULT_MAX_FILE_BYTES);
        store.append("tenant-1", &[event(1)]).await.unwrap();

        let index = read_index(storage.as_ref(), "tenant-1").await;
        assert_eq!(index.len(), 2);
        assert_eq!(index[0], "2024-01-01-00-00-00-deadbeef");
        assert_eq!(
            read_file(storage.as_ref(), "tenant-1", &index[1]).await,
            vec![event(1)]
        );
    }

    #[tokio::test]
    async fn keys_are_isolated_from_each_other() {
        let storage = Arc::new(MemoryStorage::new());
        let store = AppendLogStore::new(storage.clone(), DEFAULT_MAX_FILE_BYTES);

        store.append("tenant-1", &[event(1)]).await.unwrap();
        store.append("tenant-2", &[event(2)]).await.unwrap();

        let index_1 = read_index(storage.as_ref(), "tenant-1").await;
        let index_2 = read_index(storage.as_ref(), "tenant-2").await;
        assert_eq!(index_1.len(), 1);
        assert_eq!(index_2.len(), 1);
        assert_eq!(
            read_file(storage.as_ref(), "tenant-1", &index_1[0]).await,
            vec![event(1)]
        );
    }

    #[test]
    fn file_ids_sort_by_creation_time() {
        let id = new_file_id();
        // <time key>-<suffix>: 19 chars of time key, dash, 8-char suffix.
        assert_eq!(id.len(), 19 + 1 + FILE_ID_SUFFIX_LEN);
        assert!(medialog_core::parse_timestamp(&id[..19]).is_ok());
    }
}
