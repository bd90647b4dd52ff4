//! Router configuration for the photo service.
//!
//! This module defines the HTTP routes and applies middleware for CORS,
//! request body limits and tracing.
//!
//! # Routes
//!
//! ```text
//! /health                 - Health check
//! /api/upload             - Multipart image upload (POST)
//! /api/generate           - Generation pipeline (POST)
//! /api/quota              - Remaining quota (GET)
//! /api/results/{id}       - Saved result JSON (GET)
//! /result/{id}            - Shareable result page (GET)
//! /blobs/{*key}           - In-memory blob store (GET, development only)
//! ```
//!
//! # Serving
//!
//! ```ignore
//! use festive_photo::server::{create_router, AppState, RouterConfig};
//!
//! let state = AppState::new(pipeline, "https://photos.example.com");
//! let router = create_router(
//!     state,
//!     RouterConfig::new().with_cors_origins(vec!["https://photos.example.com".to_string()]),
//! );
//!
//! // Peer addresses give clients without forwarding headers their own quota
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(
//!     listener,
//!     router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//! )
//! .await?;
//! ```

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use super::handlers::{
    blob_handler, generate_handler, health_handler, quota_handler, result_handler, share_handler,
    upload_handler, AppState,
};
use crate::media::MAX_UPLOAD_BYTES;

/// Allowance on top of twice the upload ceiling for multipart framing and
/// base64 expansion of JSON bodies.
const BODY_OVERHEAD_BYTES: usize = 64 * 1024;

/// How long browsers may cache a preflight answer.
const CORS_MAX_AGE_SECS: u64 = 24 * 60 * 60;

// =============================================================================
// Router Settings
// =============================================================================

/// Middleware settings for [`create_router`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Origins the browser front end may call from; `None` allows any
    pub cors_origins: Option<Vec<String>>,

    /// Emit a tracing span per request
    pub enable_tracing: bool,

    /// Largest request body accepted at the transport level
    pub body_limit: usize,
}

impl RouterConfig {
    /// Any origin, request tracing on, and a body limit sized for the
    /// default upload ceiling.
    ///
    /// Bodies up to twice the ceiling are read so oversized images get a
    /// descriptive rejection instead of a bare 413.
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            enable_tracing: true,
            body_limit: body_limit_for(MAX_UPLOAD_BYTES),
        }
    }

    /// Restrict cross-origin calls to `origins`. An empty list blocks them all.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Lift any origin restriction.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Toggle per-request tracing spans.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Size the body limit for the given upload ceiling.
    pub fn with_max_upload_bytes(mut self, max_upload_bytes: usize) -> Self {
        self.body_limit = body_limit_for(max_upload_bytes);
        self
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn body_limit_for(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .saturating_mul(2)
        .saturating_add(BODY_OVERHEAD_BYTES)
}

// =============================================================================
// Router
// =============================================================================

/// Assemble the application router around `state`.
///
/// The `/blobs` route only answers when `state` carries an in-memory blob
/// store.
pub fn create_router(state: AppState, config: RouterConfig) -> Router {
    let cors = cors_layer(&config);

    let api_routes = Router::new()
        .route("/upload", post(upload_handler))
        .route("/generate", post(generate_handler))
        .route("/quota", get(quota_handler))
        .route("/results/{id}", get(result_handler));

    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .route("/result/{id}", get(share_handler))
        .route("/blobs/{*key}", get(blob_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.body_limit))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

fn cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS));

    let Some(origins) = &config.cors_origins else {
        return cors.allow_origin(Any);
    };

    // An empty list leaves allow_origin unset, which blocks every origin
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        cors
    } else {
        cors.allow_origin(allowed)
    }
}

// =============================================================================
// Tests
// =============================================================================
