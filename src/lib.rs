//! # Festive Photo
//!
//! A service that turns uploaded photos into Christmas scenes, limited to a
//! small number of generations per client per day.
//!
//! Each request runs through a fixed pipeline: the caller's daily quota is
//! consumed, the image is bounded in size, instructions are composed, an
//! image model produces the festive version, and the before/after pair is
//! saved under a short shareable id.
//!
//! ## Features
//!
//! - **Atomic fixed-window quotas**: Redis Lua script or in-process counter
//! - **Best-effort image normalization**: downscale and re-encode, never fail
//! - **Pluggable generation backend**: Gemini `generateContent` or dry run
//! - **Before/after persistence**: S3 (or memory) blobs plus TTL'd records
//! - **Shareable result pages**: Open Graph and Twitter card metadata
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`ratelimit`] - Quota counters and the fixed-window limiter
//! - [`media`] - Image payloads, upload validation and normalization
//! - [`prompt`] - Instruction text for the model
//! - [`generation`] - Generation client and vendor backends
//! - [`store`] - Blob and record stores, result persistence
//! - [`pipeline`] - The per-request orchestrator
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use festive_photo::{
//!     create_router, AppState, DryRunBackend, GenerationClient, GenerationPipeline,
//!     ImagePreprocessor, MemoryBlobStore, MemoryQuotaCounter, MemoryRecordStore,
//!     RateLimitPolicy, RateLimiter, ResultStore, RouterConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let blobs = Arc::new(MemoryBlobStore::new("http://localhost:3000"));
//!     let pipeline = GenerationPipeline::new(
//!         RateLimiter::new(Arc::new(MemoryQuotaCounter::new()), RateLimitPolicy::default()),
//!         ImagePreprocessor::default(),
//!         GenerationClient::new(Arc::new(DryRunBackend::new())),
//!         ResultStore::new(blobs.clone(), Arc::new(MemoryRecordStore::new())),
//!     );
//!
//!     let state = AppState::new(pipeline, "http://localhost:3000").with_memory_blobs(blobs);
//!     let router = create_router(state, RouterConfig::new());
//!
//!     // Start the server...
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod generation;
pub mod media;
pub mod pipeline;
pub mod prompt;
pub mod ratelimit;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, SystemClock};
pub use config::{CheckConfig, Cli, Command, GeneratorKind, ServeConfig};
pub use error::{GenerationError, PipelineError, RateLimitError, StoreError, ValidationError};
pub use generation::{
    DryRunBackend, GeminiBackend, GeminiConfig, GenerationBackend, GenerationClient, OutputAsset,
};
pub use media::{validate_upload, EncodedImage, ImageData, ImagePreprocessor};
pub use pipeline::{GenerationPipeline, GenerationRequest, PipelineFailure, PipelineResponse};
pub use ratelimit::{
    client_identifier, MemoryQuotaCounter, QuotaCounter, RateLimitInfo, RateLimitPolicy,
    RateLimiter, RedisQuotaCounter,
};
pub use server::{create_router, AppState, ClientIdentifier, ErrorResponse, RouterConfig};
pub use store::{
    create_s3_client, BlobStore, MemoryBlobStore, MemoryRecordStore, PhotoResult, RecordStore,
    RedisRecordStore, ResultStore, S3BlobStore,
};
