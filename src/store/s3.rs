//! S3-backed blob store.
//!
//! Objects are written with their content type and addressed by a public URL
//! built from a configurable base. Public read access is expected to come
//! from the bucket policy (or a CDN in front of it), not per-object ACLs.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::BlobStore;
use crate::error::StoreError;

/// S3 implementation of [`BlobStore`].
///
/// # Example
///
/// ```ignore
/// use festive_photo::store::{create_s3_client, S3BlobStore};
///
/// let client = create_s3_client(None, "us-east-1").await;
/// let store = S3BlobStore::new(client, "my-bucket", "https://cdn.example.com");
///
/// // Stored at s3://my-bucket/christmas/abc/original,
/// // returned as https://cdn.example.com/christmas/abc/original
/// let url = store.put("christmas/abc/original", bytes, "image/jpeg").await?;
/// ```
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3BlobStore {
    /// Create a store for `bucket` whose objects are reachable under `public_base_url`.
    pub fn new(
        client: Client,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Get the bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Public URL for an object key.
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Verify the bucket exists and is reachable.
    pub async fn check(&self) -> Result<(), StoreError> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Read {
                key: format!("s3://{}", self.bucket),
                message: e.to_string(),
            })
    }
}

/// Default public URL base for a bucket.
///
/// Custom endpoints (MinIO, R2, ...) use path-style addressing; AWS uses the
/// virtual-hosted form.
pub fn default_public_base_url(bucket: &str, endpoint: Option<&str>, region: &str) -> String {
    match endpoint {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String, StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                key: format!("s3://{}/{}", self.bucket, key),
                message: e.to_string(),
            })?;

        Ok(self.url_for(key))
    }
}

/// Create an S3 client with optional custom endpoint and region.
///
/// Use a custom endpoint for S3-compatible services like MinIO:
/// ```ignore
/// let client = create_s3_client(Some("http://localhost:9000"), "us-east-1").await;
/// ```
pub async fn create_s3_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;

    // S3-compatible services generally need path-style addressing
    let s3_config = if endpoint_url.is_some() {
        aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build()
    } else {
        aws_sdk_s3::config::Builder::from(&sdk_config).build()
    };

    Client::from_conf(s3_config)
}
