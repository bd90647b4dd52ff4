//! Generation client: timeout and output selection over a backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, error};

use crate::error::GenerationError;
use crate::media::ImageData;

/// Default bound on a single generation call, in seconds.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 120;

/// One asset returned by a generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputAsset {
    /// Declared media type (`image/png`, `text/plain`, ...)
    pub media_type: String,

    /// Raw asset bytes
    pub data: Bytes,
}

impl OutputAsset {
    pub fn new(media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            data: data.into(),
        }
    }

    /// Whether the declared type is an image.
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// An external image generation capability.
///
/// A backend submits one request made of the instruction text and the image,
/// and returns every asset in the response in order. Choosing among them is
/// the client's job.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Submit a single generation request.
    async fn submit(
        &self,
        instructions: &str,
        image: &ImageData,
    ) -> Result<Vec<OutputAsset>, GenerationError>;
}

/// Select the first asset whose declared type is an image.
pub fn select_first_image(assets: Vec<OutputAsset>) -> Option<ImageData> {
    assets
        .into_iter()
        .find(OutputAsset::is_image)
        .map(|asset| ImageData::new(asset.data, asset.media_type))
}

/// Calls a [`GenerationBackend`] with a bounded wait and extracts the image.
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn GenerationBackend>,
    timeout: Duration,
}

impl GenerationClient {
    /// Create a client with the default timeout.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self::with_timeout(backend, Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS))
    }

    /// Create a client with an explicit timeout.
    pub fn with_timeout(backend: Arc<dyn GenerationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Generate an image from `instructions` and `image`.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Timeout`] if the backend does not answer in time
    /// - [`GenerationError::NoImageProduced`] if no returned asset is an image
    /// - any error the backend reports
    pub async fn generate(
        &self,
        instructions: &str,
        image: &ImageData,
    ) -> Result<ImageData, GenerationError> {
        let submit = self.backend.submit(instructions, image);

        let assets = match tokio::time::timeout(self.timeout, submit).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
        .map_err(|e| {
            error!(backend = self.backend.name(), "Generation failed: {}", e);
            e
        })?;

        debug!(
            backend = self.backend.name(),
            assets = assets.len(),
            "Generation returned"
        );

        select_first_image(assets).ok_or_else(|| {
            error!(backend = self.backend.name(), "Generation returned no image");
            GenerationError::NoImageProduced
        })
    }
}
