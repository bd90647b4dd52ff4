//! HTTP server layer for the photo service.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │        POST /api/generate   GET /result/{id}   ...              │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │    share    │  │        routes           │  │
//! │  │ (requests)  │  │ (HTML page) │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;
pub mod share;

pub use handlers::{
    blob_handler, generate_handler, health_handler, pipeline_error_status, quota_handler,
    result_handler, share_handler, upload_handler, AppState, ClientIdentifier, ErrorResponse,
    GenerateBody, HandlerError, HealthResponse, UploadResponse,
};
pub use routes::{create_router, RouterConfig};
pub use share::{generate_not_found_html, generate_share_html};
