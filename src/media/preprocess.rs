//! Best-effort image normalization.
//!
//! Uploaded photos are bounded in size before they are sent to the
//! generation model:
//!
//! - **Downscale only**: if either side exceeds the maximum dimension, the
//!   image is resized so its larger side equals that dimension, aspect ratio
//!   preserved. Smaller images keep their pixel dimensions.
//!
//! - **Re-encode**: JPEG output uses the configured quality. PNG stays PNG
//!   (lossless). Other decodable formats (WebP, GIF) are re-encoded as JPEG.
//!
//! - **Never fails**: if the bytes cannot be decoded or encoded, the original
//!   bytes and media type are returned unchanged.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::{debug, warn};

use super::ImageData;

/// Default bound on the larger image side, in pixels.
pub const DEFAULT_MAX_DIMENSION: u32 = 1024;

/// Default lossy encoding quality (0.0-1.0].
pub const DEFAULT_QUALITY: f32 = 0.85;

/// Normalizes user images into a bounded payload.
///
/// # Example
///
/// ```ignore
/// use festive_photo::media::{ImageData, ImagePreprocessor};
///
/// let preprocessor = ImagePreprocessor::default();
/// let upload = ImageData::new(bytes, "image/jpeg");
///
/// // 2000x1000 in, 1024x512 out
/// let normalized = preprocessor.normalize(&upload);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePreprocessor {
    max_dimension: u32,
    quality: f32,
}

impl ImagePreprocessor {
    /// Create a preprocessor.
    ///
    /// # Arguments
    ///
    /// * `max_dimension` - Bound on the larger side in pixels (at least 1)
    /// * `quality` - Lossy encoding quality in (0.0, 1.0]
    pub fn new(max_dimension: u32, quality: f32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            quality: quality.clamp(0.01, 1.0),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Quality mapped onto the JPEG encoder's 1-100 scale.
    pub fn jpeg_quality(&self) -> u8 {
        (self.quality * 100.0).round().clamp(1.0, 100.0) as u8
    }

    /// Normalize an image, falling back to the input on any failure.
    pub fn normalize(&self, image: &ImageData) -> ImageData {
        match self.try_normalize(image) {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!(
                    media_type = %image.media_type,
                    size = image.len(),
                    "Image optimization skipped: {}",
                    e
                );
                image.clone()
            }
        }
    }

    fn try_normalize(&self, image: &ImageData) -> Result<ImageData, image::ImageError> {
        let format = ImageFormat::from_mime_type(&image.media_type)
            .map(Ok)
            .unwrap_or_else(|| image::guess_format(&image.data))?;

        let decoded = image::load_from_memory_with_format(&image.data, format)?;
        let (width, height) = (decoded.width(), decoded.height());
        let (target_width, target_height) = target_dimensions(width, height, self.max_dimension);
        let resized = (target_width, target_height) != (width, height);

        let img = if resized {
            decoded.resize_exact(target_width, target_height, FilterType::Lanczos3)
        } else {
            decoded
        };

        let normalized = match format {
            ImageFormat::Png => {
                let mut output = Vec::new();
                img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
                ImageData::new(output, "image/png")
            }
            _ => {
                let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
                let mut output = Vec::new();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.jpeg_quality());
                encoder.encode_image(&rgb)?;
                ImageData::new(output, "image/jpeg")
            }
        };

        // Re-encoding an already small image can grow it; keep the smaller one.
        if !resized && normalized.len() >= image.len() {
            debug!(width, height, "Image already within bounds, keeping original");
            return Ok(image.clone());
        }

        debug!(
            width,
            height,
            target_width,
            target_height,
            bytes_in = image.len(),
            bytes_out = normalized.len(),
            "Image normalized"
        );

        Ok(normalized)
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION, DEFAULT_QUALITY)
    }
}

/// Dimensions after bounding the larger side to `max_dimension`.
///
/// Images already within bounds are returned unchanged.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let scale = |side: u32, longer: u32| -> u32 {
        let scaled = (side as f64 * max_dimension as f64 / longer as f64).round() as u32;
        scaled.clamp(1, max_dimension)
    };

    if width >= height {
        (max_dimension, scale(height, width))
    } else {
        (scale(width, height), max_dimension)
    }
}

/// Read pixel dimensions without a full decode.
pub fn image_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

// =============================================================================
// Tests
// =============================================================================
