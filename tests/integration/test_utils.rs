//! Test utilities for integration tests.
//!
//! This module provides counting fakes for every external dependency of the
//! pipeline and helpers for building requests and test images.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};

use festive_photo::error::{GenerationError, RateLimitError};
use festive_photo::{
    create_router, AppState, GenerationBackend, GenerationClient, GenerationPipeline,
    ImageData, ImagePreprocessor, MemoryBlobStore, MemoryQuotaCounter, MemoryRecordStore,
    OutputAsset, QuotaCounter, RateLimitPolicy, RateLimiter, ResultStore, RouterConfig,
};

/// Base URL the in-memory blob store roots its URLs at.
pub const TEST_PUBLIC_URL: &str = "http://photos.test";

// =============================================================================
// Generation Backend
// =============================================================================

/// A generation backend that counts submissions and answers with a fixed
/// PNG, or fails when told to.
pub struct CountingBackend {
    calls: AtomicUsize,
    fail: AtomicBool,
    output: Vec<u8>,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
            output: create_test_png(8, 8),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// The PNG every successful submission returns.
    pub fn output(&self) -> &[u8] {
        &self.output
    }
}

#[async_trait]
impl GenerationBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    async fn submit(
        &self,
        _instructions: &str,
        _image: &ImageData,
    ) -> Result<Vec<OutputAsset>, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(GenerationError::Vendor {
                status: 500,
                message: "upstream exploded: internal trace id 42".to_string(),
            });
        }

        Ok(vec![
            OutputAsset::new("text/plain", "Here is your festive photo"),
            OutputAsset::new("image/png", self.output.clone()),
        ])
    }
}

// =============================================================================
// Quota Counter
// =============================================================================

/// A quota counter whose backing store is unreachable.
pub struct UnreachableCounter;

#[async_trait]
impl QuotaCounter for UnreachableCounter {
    async fn try_consume(
        &self,
        _key: &str,
        _limit: u32,
        _expires_at_millis: u64,
    ) -> Result<Option<u32>, RateLimitError> {
        Err(RateLimitError::Unavailable("connection refused".to_string()))
    }

    async fn used(&self, _key: &str) -> Result<u32, RateLimitError> {
        Err(RateLimitError::Unavailable("connection refused".to_string()))
    }
}

// =============================================================================
// Application Builder
// =============================================================================

/// A router plus handles on its fakes.
pub struct TestApp {
    pub router: Router,
    pub backend: Arc<CountingBackend>,
    pub blobs: Arc<MemoryBlobStore>,
}

/// Build an app with in-memory stores and a daily limit of `limit`.
pub fn test_app(limit: u32) -> TestApp {
    test_app_with_counter(Arc::new(MemoryQuotaCounter::new()), limit)
}

/// Build an app around a specific quota counter.
pub fn test_app_with_counter(counter: Arc<dyn QuotaCounter>, limit: u32) -> TestApp {
    let backend = Arc::new(CountingBackend::new());
    let blobs = Arc::new(MemoryBlobStore::new(TEST_PUBLIC_URL));

    let pipeline = GenerationPipeline::new(
        RateLimiter::new(
            counter,
            RateLimitPolicy::new(limit, Duration::from_secs(24 * 60 * 60)),
        ),
        ImagePreprocessor::default(),
        GenerationClient::new(backend.clone()),
        ResultStore::new(blobs.clone(), Arc::new(MemoryRecordStore::new())),
    );

    let state = AppState::new(pipeline, TEST_PUBLIC_URL).with_memory_blobs(blobs.clone());
    let router = create_router(state, RouterConfig::new().with_tracing(false));

    TestApp {
        router,
        backend,
        blobs,
    }
}

// =============================================================================
// Requests
// =============================================================================

/// A `POST /api/generate` request from `client` carrying a JPEG.
pub fn generate_request(client: &str, jpeg: &[u8], prompt: Option<&str>) -> Request<Body> {
    let mut body = serde_json::json!({
        "image": { "data": BASE64.encode(jpeg), "mimeType": "image/jpeg" },
    });
    if let Some(prompt) = prompt {
        body["prompt"] = serde_json::Value::String(prompt.to_string());
    }

    json_request(client, body)
}

/// A `POST /api/generate` request with an arbitrary JSON body.
pub fn json_request(client: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub const MULTIPART_BOUNDARY: &str = "festive-test-boundary";

/// A multipart body with one file field.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

/// A `POST /api/upload` request with the given multipart body.
pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// Images
// =============================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// Encode a gradient as JPEG.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, 90);
    gradient(width, height).write_with_encoder(encoder).unwrap();
    out
}

/// Encode a gradient as PNG.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Read the dimensions of an encoded image.
pub fn dimensions_of(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}
