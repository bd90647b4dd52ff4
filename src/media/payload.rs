//! Image payload types and upload validation.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Hard ceiling on an accepted upload (3 MiB).
pub const MAX_UPLOAD_BYTES: usize = 3 * 1024 * 1024;

/// An image held in memory with its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Encoded image bytes (JPEG, PNG, ...)
    pub data: Bytes,

    /// Media type, e.g. `image/jpeg`
    pub media_type: String,
}

impl ImageData {
    pub fn new(data: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: media_type.into(),
        }
    }

    /// Decode a base64 payload.
    pub fn from_base64(
        data: &str,
        media_type: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let bytes = BASE64
            .decode(data.trim().as_bytes())
            .map_err(|_| ValidationError::InvalidEncoding)?;
        Ok(Self::new(bytes, media_type))
    }

    /// Parse a `data:<media type>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, ValidationError> {
        let rest = url
            .strip_prefix("data:")
            .ok_or(ValidationError::InvalidDataUrl)?;
        let (media_type, payload) = rest
            .split_once(";base64,")
            .ok_or(ValidationError::InvalidDataUrl)?;
        if media_type.is_empty() || payload.is_empty() {
            return Err(ValidationError::InvalidDataUrl);
        }
        Self::from_base64(payload, media_type)
    }

    /// Base64 encoding of the bytes.
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Render as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.to_base64())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// JSON wire form of an image: base64 data plus media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: String,
}

impl EncodedImage {
    /// Decode and validate against the upload rules.
    pub fn decode(&self, max_bytes: usize) -> Result<ImageData, ValidationError> {
        if self.data.is_empty() {
            return Err(ValidationError::MissingImage);
        }
        check_media_type(&self.mime_type)?;
        let image = ImageData::from_base64(&self.data, self.mime_type.clone())?;
        validate_upload(&image.media_type, image.len(), max_bytes)?;
        Ok(image)
    }
}

impl From<&ImageData> for EncodedImage {
    fn from(image: &ImageData) -> Self {
        Self {
            data: image.to_base64(),
            mime_type: image.media_type.clone(),
        }
    }
}

/// Check an upload's declared media type and size.
///
/// Rejects empty payloads, media types that do not start with `image/`, and
/// payloads larger than `max_bytes`.
pub fn validate_upload(
    media_type: &str,
    size: usize,
    max_bytes: usize,
) -> Result<(), ValidationError> {
    check_media_type(media_type)?;

    if size == 0 {
        return Err(ValidationError::MissingImage);
    }

    if size > max_bytes {
        return Err(ValidationError::TooLarge { size, max_bytes });
    }

    Ok(())
}

fn check_media_type(media_type: &str) -> Result<(), ValidationError> {
    if !media_type.starts_with("image/") {
        return Err(ValidationError::NotAnImage {
            media_type: media_type.to_string(),
        });
    }
    Ok(())
}
