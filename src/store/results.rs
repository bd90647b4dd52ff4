//! Result pairs: id allocation, uploads and the commit-point record.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{BlobStore, RecordStore};
use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::media::ImageData;

/// Length of a result id.
pub const ID_LENGTH: usize = 10;

/// URL-safe characters ids are drawn from.
pub const ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// How long a result stays retrievable (30 days).
pub const DEFAULT_RESULT_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// A persisted before/after pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoResult {
    pub id: String,
    pub original_url: String,
    pub generated_url: String,
    /// Epoch milliseconds
    pub created_at: u64,
}

/// Generate a random result id.
pub fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// Whether `id` could have been produced by [`generate_id`].
pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LENGTH && id.bytes().all(|b| ID_ALPHABET.contains(&b))
}

fn record_key(id: &str) -> String {
    format!("photo:{}", id)
}

fn blob_key(id: &str, kind: &str) -> String {
    format!("christmas/{}/{}", id, kind)
}

/// Persists result pairs over a [`BlobStore`] and a [`RecordStore`].
///
/// Both images are uploaded concurrently; the record is written only after
/// both succeed, so a failed upload never leaves a visible result behind.
#[derive(Clone)]
pub struct ResultStore {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn RecordStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultStore {
    pub fn new(blobs: Arc<dyn BlobStore>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            blobs,
            records,
            ttl: Duration::from_secs(DEFAULT_RESULT_TTL_SECS),
            clock: Arc::new(SystemClock),
        }
    }

    /// Set the record retention period.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the clock used for `created_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Upload both images and commit a record for them under a fresh id.
    pub async fn save(
        &self,
        original: &ImageData,
        generated: &ImageData,
    ) -> Result<PhotoResult, StoreError> {
        let id = generate_id();
        let original_key = blob_key(&id, "original");
        let generated_key = blob_key(&id, "generated");

        let (original_url, generated_url) = tokio::try_join!(
            self.blobs
                .put(&original_key, original.data.clone(), &original.media_type),
            self.blobs
                .put(&generated_key, generated.data.clone(), &generated.media_type),
        )?;
        debug!(id = %id, "Result images uploaded");

        let result = PhotoResult {
            id: id.clone(),
            original_url,
            generated_url,
            created_at: self.clock.now_millis(),
        };

        let key = record_key(&id);
        let value = serde_json::to_string(&result).map_err(|e| StoreError::Write {
            key: key.clone(),
            message: e.to_string(),
        })?;

        if !self.records.insert_new(&key, value, self.ttl).await? {
            return Err(StoreError::IdCollision(id));
        }

        info!(id = %result.id, "Result saved");
        Ok(result)
    }

    /// Look up a result. Unknown, expired and malformed ids are `Ok(None)`.
    pub async fn get(&self, id: &str) -> Result<Option<PhotoResult>, StoreError> {
        if !is_valid_id(id) {
            return Ok(None);
        }

        let key = record_key(id);
        let Some(value) = self.records.get(&key).await? else {
            return Ok(None);
        };

        serde_json::from_str(&value)
            .map(Some)
            .map_err(|e| StoreError::MalformedRecord {
                key,
                message: e.to_string(),
            })
    }
}
