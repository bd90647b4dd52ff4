//! Image payloads, upload acceptance and best-effort normalization.
//!
//! # Components
//!
//! - [`ImageData`]: decoded image bytes plus declared media type
//! - [`EncodedImage`]: the base64 wire form used by the JSON API
//! - [`validate_upload`]: media type and size checks applied at the boundary
//! - [`ImagePreprocessor`]: downscales and re-encodes images before generation

mod payload;
mod preprocess;

pub use payload::{validate_upload, EncodedImage, ImageData, MAX_UPLOAD_BYTES};
pub use preprocess::{
    image_dimensions, target_dimensions, ImagePreprocessor, DEFAULT_MAX_DIMENSION,
    DEFAULT_QUALITY,
};
