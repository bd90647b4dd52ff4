//! Generation backend that returns the submitted image.

use async_trait::async_trait;
use tracing::debug;

use super::{GenerationBackend, OutputAsset};
use crate::error::GenerationError;
use crate::media::ImageData;

/// Offline backend for local development: the "generated" image is the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunBackend;

impl DryRunBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl GenerationBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn submit(
        &self,
        instructions: &str,
        image: &ImageData,
    ) -> Result<Vec<OutputAsset>, GenerationError> {
        debug!(
            instructions_len = instructions.len(),
            image_bytes = image.len(),
            "Dry-run generation"
        );

        Ok(vec![
            OutputAsset::new("text/plain", "dry run: image returned unchanged"),
            OutputAsset::new(image.media_type.clone(), image.data.clone()),
        ])
    }
}
