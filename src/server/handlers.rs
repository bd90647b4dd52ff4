//! HTTP request handlers for the photo API.
//!
//! # Endpoints
//!
//! - `POST /api/upload` - Validate a multipart image and return it base64-encoded
//! - `POST /api/generate` - Run the generation pipeline
//! - `GET /api/quota` - Remaining quota for the caller
//! - `GET /api/results/{id}` - A saved result as JSON
//! - `GET /result/{id}` - Shareable result page
//! - `GET /blobs/{*key}` - Images held by the in-memory blob store
//! - `GET /health` - Health check endpoint

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{
        multipart::Multipart, rejection::JsonRejection, ConnectInfo, FromRequestParts, Path, State,
    },
    http::{header, request::Parts, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{PipelineError, RateLimitError, StoreError, ValidationError};
use crate::media::{validate_upload, EncodedImage, MAX_UPLOAD_BYTES};
use crate::pipeline::{GenerationPipeline, GenerationRequest, PipelineFailure, PipelineResponse};
use crate::ratelimit::{client_identifier, RateLimitInfo};
use crate::store::{MemoryBlobStore, PhotoResult};

use super::share::{generate_not_found_html, generate_share_html};

/// Multipart field carrying the uploaded file.
const UPLOAD_FIELD: &str = "image";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// The generation pipeline
    pub pipeline: Arc<GenerationPipeline>,

    /// In-memory blob store to serve under `/blobs`, when one is in use
    pub blobs: Option<Arc<MemoryBlobStore>>,

    /// Public base URL of this service, used for share links
    pub public_url: String,

    /// Largest accepted image payload in bytes
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Create a new application state around a pipeline.
    pub fn new(pipeline: GenerationPipeline, public_url: impl Into<String>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            blobs: None,
            public_url: public_url.into(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    /// Serve the given in-memory blob store under `/blobs`.
    pub fn with_memory_blobs(mut self, blobs: Arc<MemoryBlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    /// Set the upload size ceiling.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
}

// =============================================================================
// Extractors
// =============================================================================

/// Rate-limit identifier of the calling client.
///
/// Derived from forwarding headers, then the TCP peer address when the server
/// was started with connect info, then the shared anonymous bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentifier(pub String);

impl<S> FromRequestParts<S> for ClientIdentifier
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(ClientIdentifier(client_identifier(&parts.headers, peer)))
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of `POST /api/generate`.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: Option<String>,

    #[serde(default)]
    pub image: Option<EncodedImage>,
}

/// Response of `POST /api/upload`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Base64 file contents
    pub data: String,

    pub mime_type: String,

    /// Size in bytes
    pub size: usize,

    /// Client-supplied file name
    pub name: String,
}

/// JSON error response returned for all error conditions outside the pipeline.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Status code and error type for a pipeline error.
pub fn pipeline_error_status(error: &PipelineError) -> (StatusCode, &'static str) {
    match error {
        PipelineError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        PipelineError::QuotaExceeded { .. } => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        PipelineError::RateLimiter(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, "rate_limiter_unavailable")
        }
        PipelineError::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
        PipelineError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
    }
}

/// Log an error response based on its severity:
/// - 5xx errors are logged at ERROR level (server errors)
/// - 404s at DEBUG level (common and expected)
/// - other 4xx errors at WARN level (client errors)
fn log_error(status: StatusCode, error_type: &str, detail: &dyn std::fmt::Display) {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            detail
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            detail
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            detail
        );
    }
}

/// Convert a failed pipeline run to HTTP response.
///
/// The body keeps the pipeline response shape so clients always receive
/// `rateLimitInfo`; internal detail is logged, never returned.
impl IntoResponse for PipelineFailure {
    fn into_response(self) -> Response {
        let (status, error_type) = pipeline_error_status(&self.error);
        log_error(status, error_type, &self.error);

        let mut response = (status, Json(self.to_response())).into_response();
        if let PipelineError::QuotaExceeded {
            retry_after_secs, ..
        } = self.error
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

/// Errors from the non-pipeline endpoints.
#[derive(Debug)]
pub enum HandlerError {
    /// Unknown or expired resource
    NotFound(String),

    /// Rejected upload
    Validation(ValidationError),

    /// Quota backend unreachable
    RateLimiter(RateLimitError),

    /// Result store failure
    Store(StoreError),
}

impl From<ValidationError> for HandlerError {
    fn from(err: ValidationError) -> Self {
        HandlerError::Validation(err)
    }
}

impl From<RateLimitError> for HandlerError {
    fn from(err: RateLimitError) -> Self {
        HandlerError::RateLimiter(err)
    }
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        HandlerError::Store(err)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            HandlerError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Not found: {}", what),
            ),
            HandlerError::Validation(e) => {
                (StatusCode::BAD_REQUEST, "invalid_request", e.to_string())
            }
            HandlerError::RateLimiter(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "rate_limiter_unavailable",
                "Unable to check your remaining quota. Please try again later.".to_string(),
            ),
            HandlerError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Failed to load result".to_string(),
            ),
        };

        match &self {
            HandlerError::RateLimiter(e) => log_error(status, error_type, e),
            HandlerError::Store(e) => log_error(status, error_type, e),
            _ => log_error(status, error_type, &message),
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle image uploads.
///
/// # Endpoint
///
/// `POST /api/upload` (multipart, field `image`)
///
/// # Response
///
/// - `200 OK`: `{ "data": "<base64>", "mimeType", "size", "name" }`
/// - `400 Bad Request`: no file, not an image, or too large
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, HandlerError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| ValidationError::MalformedBody(e.body_text()))?;
        let Some(field) = field else {
            return Err(ValidationError::MissingImage.into());
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        let mime_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ValidationError::MalformedBody(e.body_text()))?;

        validate_upload(&mime_type, data.len(), state.max_upload_bytes)?;

        info!(
            name = %name,
            size = data.len(),
            mime_type = %mime_type,
            "Processing image upload"
        );

        return Ok(Json(UploadResponse {
            data: BASE64.encode(&data),
            mime_type,
            size: data.len(),
            name,
        }));
    }
}

/// Handle generation requests.
///
/// # Endpoint
///
/// `POST /api/generate` with JSON `{ "prompt"?, "image": { "data", "mimeType" } }`
///
/// # Response
///
/// Always the pipeline response shape (`imageData`, `rateLimitInfo`, `error`?,
/// `photoResult`?), with status:
///
/// - `200 OK`: generated and saved
/// - `400 Bad Request`: invalid image payload
/// - `429 Too Many Requests`: no quota left today
/// - `502 Bad Gateway`: generation failed
/// - `500 Internal Server Error`: result could not be saved
/// - `503 Service Unavailable`: quota could not be checked
pub async fn generate_handler(
    State(state): State<AppState>,
    ClientIdentifier(identifier): ClientIdentifier,
    body: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<PipelineResponse>, PipelineFailure> {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            let error = ValidationError::MalformedBody(rejection.body_text());
            return Err(state.pipeline.reject(&identifier, error).await);
        }
    };

    let request = match GenerationRequest::from_encoded(
        body.prompt,
        body.image.as_ref(),
        state.max_upload_bytes,
    ) {
        Ok(request) => request,
        Err(error) => return Err(state.pipeline.reject(&identifier, error).await),
    };

    state.pipeline.run(&identifier, request).await.map(Json)
}

/// Handle quota status requests.
///
/// # Endpoint
///
/// `GET /api/quota`
///
/// Reports the caller's quota without consuming any.
pub async fn quota_handler(
    State(state): State<AppState>,
    ClientIdentifier(identifier): ClientIdentifier,
) -> Result<Json<RateLimitInfo>, HandlerError> {
    let info = state.pipeline.quota_status(&identifier).await?;
    Ok(Json(info))
}

/// Handle result lookups.
///
/// # Endpoint
///
/// `GET /api/results/{id}`
///
/// # Response
///
/// - `200 OK`: `{ "id", "originalUrl", "generatedUrl", "createdAt" }`
/// - `404 Not Found`: unknown or expired id
pub async fn result_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PhotoResult>, HandlerError> {
    match state.pipeline.get_result(&id).await? {
        Some(result) => Ok(Json(result)),
        None => Err(HandlerError::NotFound(format!("result {}", id))),
    }
}

/// Handle shareable result pages.
///
/// # Endpoint
///
/// `GET /result/{id}`
///
/// Returns an HTML page with the before/after pair and link-preview
/// metadata, or a "not found" page with status 404.
pub async fn share_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, HandlerError> {
    let response = match state.pipeline.get_result(&id).await? {
        Some(result) => Html(generate_share_html(&result, &state.public_url)).into_response(),
        None => {
            debug!(id = %id, "Share page requested for unknown result");
            (StatusCode::NOT_FOUND, Html(generate_not_found_html())).into_response()
        }
    };
    Ok(response)
}

/// Serve images held by the in-memory blob store.
///
/// # Endpoint
///
/// `GET /blobs/{*key}`
///
/// Only answers when the service runs without an S3 bucket.
pub async fn blob_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, HandlerError> {
    let Some(blobs) = state.blobs.as_ref() else {
        return Err(HandlerError::NotFound(format!("blob {}", key)));
    };

    let Some((data, content_type)) = blobs.get(&key).await else {
        return Err(HandlerError::NotFound(format!("blob {}", key)));
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable".to_string(),
            ),
        ],
        data,
    )
        .into_response())
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
