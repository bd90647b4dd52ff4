//! Public blob storage for result images.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;

/// Durable storage for images that must be retrievable by URL.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key` and return its public URL.
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, StoreError>;
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: String,
    expires_at: u64,
}

/// In-process blob store.
///
/// URLs have the form `{base_url}/blobs/{key}`; the HTTP server serves them
/// from this store when it is the active backend. With a retention period,
/// blobs disappear once it elapses and expired entries are dropped on the
/// next write, so blobs of expired results and orphans of failed saves do
/// not accumulate.
pub struct MemoryBlobStore {
    base_url: String,
    blobs: RwLock<HashMap<String, StoredBlob>>,
    retention: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl MemoryBlobStore {
    /// Create a store whose URLs are rooted at `base_url`. Blobs never expire.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            blobs: RwLock::new(HashMap::new()),
            retention: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Drop blobs `retention` after they were written.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Public URL for `key`.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/blobs/{}", self.base_url, key)
    }

    /// Fetch a live blob and its content type by key.
    pub async fn get(&self, key: &str) -> Option<(Bytes, String)> {
        let now = self.clock.now_millis();
        self.blobs
            .read()
            .await
            .get(key)
            .filter(|blob| blob.expires_at > now)
            .map(|blob| (blob.data.clone(), blob.content_type.clone()))
    }

    /// Fetch a blob by a URL previously returned from [`BlobStore::put`].
    pub async fn get_by_url(&self, url: &str) -> Option<(Bytes, String)> {
        let prefix = format!("{}/blobs/", self.base_url);
        let key = url.strip_prefix(&prefix)?;
        self.get(key).await
    }

    /// Number of blobs held, expired ones included until the next write.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn expiry_from(&self, now: u64) -> u64 {
        match self.retention {
            Some(retention) => {
                now.saturating_add(u64::try_from(retention.as_millis()).unwrap_or(u64::MAX))
            }
            None => u64::MAX,
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, StoreError> {
        let now = self.clock.now_millis();
        let mut blobs = self.blobs.write().await;
        blobs.retain(|_, blob| blob.expires_at > now);
        blobs.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
                expires_at: self.expiry_from(now),
            },
        );
        Ok(self.url_for(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::testing::ManualClock;

    #[tokio::test]
    async fn test_put_and_get_by_url() {
        let store = MemoryBlobStore::new("http://localhost:3000/");
        let url = store
            .put("christmas/abc/original", Bytes::from_static(b"img"), "image/png")
            .await
            .unwrap();

        assert_eq!(url, "http://localhost:3000/blobs/christmas/abc/original");

        let (data, content_type) = store.get_by_url(&url).await.unwrap();
        assert_eq!(data.as_ref(), b"img");
        assert_eq!(content_type, "image/png");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_foreign_url_not_found() {
        let store = MemoryBlobStore::new("http://localhost:3000");
        assert!(store.get_by_url("http://elsewhere/blobs/x").await.is_none());
        assert!(store.get("missing").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_blobs_expire_after_retention() {
        let clock = ManualClock::new(1_000_000);
        let store = MemoryBlobStore::new("http://localhost")
            .with_retention(Duration::from_secs(60))
            .with_clock(Arc::new(clock.clone()));

        store
            .put("christmas/old/original", Bytes::from_static(b"old"), "image/jpeg")
            .await
            .unwrap();

        clock.advance(59_999);
        assert!(store.get("christmas/old/original").await.is_some());

        clock.advance(1);
        assert!(store.get("christmas/old/original").await.is_none());
        assert_eq!(store.len().await, 1);

        // The next write drops what has expired
        store
            .put("christmas/new/original", Bytes::from_static(b"new"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(store.len().await, 1);
        assert!(store.get("christmas/new/original").await.is_some());
    }

    #[tokio::test]
    async fn test_no_retention_keeps_blobs() {
        let clock = ManualClock::new(0);
        let store = MemoryBlobStore::new("http://localhost").with_clock(Arc::new(clock.clone()));

        store
            .put("k", Bytes::from_static(b"v"), "image/png")
            .await
            .unwrap();
        clock.advance(365 * 24 * 60 * 60 * 1000);

        assert!(store.get("k").await.is_some());
    }
}
