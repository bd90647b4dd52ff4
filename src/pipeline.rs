//! Generation pipeline orchestrating quota, preprocessing, generation and persistence.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        GenerationPipeline                        │
//! │  ┌────────────────────────────────────────────────────────────┐  │
//! │  │                          run()                             │  │
//! │  │  1. Consume quota     3. Compose prompt    5. Save pair    │  │
//! │  │  2. Normalize image   4. Generate                          │  │
//! │  └────────────────────────────────────────────────────────────┘  │
//! │        │              │                  │               │       │
//! │        ▼              ▼                  ▼               ▼       │
//! │  ┌───────────┐ ┌───────────────┐ ┌────────────────┐ ┌──────────┐ │
//! │  │RateLimiter│ │ImagePreprocess│ │GenerationClient│ │ResultStore│ │
//! │  └───────────┘ └───────────────┘ └────────────────┘ └──────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Steps run strictly in order. Nothing past the quota check runs for a
//! caller without quota, and nothing is persisted without a generated image.
//! Quota consumed by a run that later fails is not returned.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, RateLimitError, StoreError, ValidationError};
use crate::generation::GenerationClient;
use crate::media::{EncodedImage, ImageData, ImagePreprocessor};
use crate::prompt;
use crate::ratelimit::{RateLimitInfo, RateLimiter};
use crate::store::{PhotoResult, ResultStore};

// =============================================================================
// Request / Response
// =============================================================================

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Free text from the caller; may be empty
    pub prompt: String,

    /// Uploaded image
    pub image: ImageData,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, image: ImageData) -> Self {
        Self {
            prompt: prompt.into(),
            image,
        }
    }

    /// Build a request from its wire form, applying the upload rules.
    pub fn from_encoded(
        prompt: Option<String>,
        image: Option<&EncodedImage>,
        max_upload_bytes: usize,
    ) -> Result<Self, ValidationError> {
        let image = image
            .ok_or(ValidationError::MissingImage)?
            .decode(max_upload_bytes)?;
        Ok(Self::new(prompt.unwrap_or_default(), image))
    }
}

/// Response for every pipeline run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResponse {
    /// Generated image as a data URL; `None` on failure
    pub image_data: Option<String>,

    /// Quota state after this run
    pub rate_limit_info: RateLimitInfo,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_result: Option<PhotoResult>,
}

/// A failed run: the error plus the quota state to report with it.
#[derive(Debug, Clone)]
pub struct PipelineFailure {
    pub error: PipelineError,
    pub rate_limit_info: RateLimitInfo,
}

impl PipelineFailure {
    /// Response body for this failure.
    pub fn to_response(&self) -> PipelineResponse {
        PipelineResponse {
            image_data: None,
            rate_limit_info: self.rate_limit_info,
            error: Some(self.error.public_message()),
            photo_result: None,
        }
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Orchestrates one generation per request.
///
/// Holds no mutable state of its own; quota counters and results live behind
/// the limiter and the store.
#[derive(Clone)]
pub struct GenerationPipeline {
    limiter: RateLimiter,
    preprocessor: ImagePreprocessor,
    generator: GenerationClient,
    store: ResultStore,
}

impl GenerationPipeline {
    pub fn new(
        limiter: RateLimiter,
        preprocessor: ImagePreprocessor,
        generator: GenerationClient,
        store: ResultStore,
    ) -> Self {
        Self {
            limiter,
            preprocessor,
            generator,
            store,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Run one generation for `identifier`.
    pub async fn run(
        &self,
        identifier: &str,
        request: GenerationRequest,
    ) -> Result<PipelineResponse, PipelineFailure> {
        let info = match self.limiter.check_and_consume(identifier).await {
            Ok(info) => info,
            Err(e) => {
                error!(identifier = identifier, "Quota check failed: {}", e);
                return Err(PipelineFailure {
                    error: e.into(),
                    rate_limit_info: RateLimitInfo::unavailable(self.limiter.limit()),
                });
            }
        };

        if !info.success {
            let retry_after_secs = info
                .reset
                .saturating_sub(self.limiter.now_millis())
                .div_ceil(1000);
            info!(identifier = identifier, reset = info.reset, "Quota exhausted");
            return Err(PipelineFailure {
                error: PipelineError::QuotaExceeded {
                    limit: info.limit,
                    reset: info.reset,
                    retry_after_secs,
                },
                rate_limit_info: info,
            });
        }

        let fail = |error: PipelineError| PipelineFailure {
            error,
            rate_limit_info: info,
        };

        let image = self.normalize(request.image).await;
        let instructions = prompt::compose(&request.prompt);

        let generated = self
            .generator
            .generate(&instructions, &image)
            .await
            .map_err(|e| fail(e.into()))?;

        let result = self.store.save(&image, &generated).await.map_err(|e| {
            error!(identifier = identifier, "Failed to persist result: {}", e);
            fail(e.into())
        })?;

        info!(
            identifier = identifier,
            id = %result.id,
            remaining = info.remaining,
            "Generation completed"
        );

        Ok(PipelineResponse {
            image_data: Some(generated.to_data_url()),
            rate_limit_info: info,
            error: None,
            photo_result: Some(result),
        })
    }

    /// Failure for a request rejected before the pipeline ran.
    ///
    /// Carries the caller's current quota without consuming any.
    pub async fn reject(&self, identifier: &str, error: ValidationError) -> PipelineFailure {
        debug!(identifier = identifier, "Rejected invalid request: {}", error);
        PipelineFailure {
            error: error.into(),
            rate_limit_info: self.quota_status_or_unavailable(identifier).await,
        }
    }

    /// Current quota for `identifier` without consuming any.
    pub async fn quota_status(
        &self,
        identifier: &str,
    ) -> Result<RateLimitInfo, RateLimitError> {
        self.limiter.peek(identifier).await
    }

    /// Look up a saved result.
    pub async fn get_result(&self, id: &str) -> Result<Option<PhotoResult>, StoreError> {
        self.store.get(id).await
    }

    async fn quota_status_or_unavailable(&self, identifier: &str) -> RateLimitInfo {
        match self.limiter.peek(identifier).await {
            Ok(info) => info,
            Err(e) => {
                warn!(identifier = identifier, "Quota status unavailable: {}", e);
                RateLimitInfo::unavailable(self.limiter.limit())
            }
        }
    }

    /// Decode and resize off the async runtime; best effort.
    async fn normalize(&self, image: ImageData) -> ImageData {
        let preprocessor = self.preprocessor;
        let input = image.clone();
        match tokio::task::spawn_blocking(move || preprocessor.normalize(&input)).await {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!("Image preprocessing task failed: {}", e);
                image
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
