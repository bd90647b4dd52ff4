//! Gemini `generateContent` backend.
//!
//! Sends the instruction text and the image as inline data in a single user
//! turn, and returns every inline-data part of every candidate as an asset.
//! Text parts are returned as `text/plain` assets so the client's selection
//! sees the response in order.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{GenerationBackend, OutputAsset, DEFAULT_GENERATION_TIMEOUT_SECS};
use crate::error::GenerationError;
use crate::media::ImageData;

/// Default Gemini REST API base.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default image-capable model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-image-preview";

/// Longest vendor error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

// =============================================================================
// Configuration
// =============================================================================

/// Vendor configuration for [`GeminiBackend`].
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`
    pub api_key: String,

    /// Model name, with or without the `models/` prefix
    pub model: String,

    /// REST API base URL
    pub api_base: String,

    /// Requested output size (e.g. "1K", "2K"); omitted when `None`
    pub image_size: Option<String>,

    /// HTTP request timeout
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Configuration with default model, base URL and timeout.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            image_size: None,
            timeout: Duration::from_secs(DEFAULT_GENERATION_TIMEOUT_SECS),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_image_size(mut self, image_size: Option<String>) -> Self {
        self.image_size = image_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full `generateContent` URL for the configured model.
    pub fn endpoint(&self) -> String {
        let base = self.api_base.trim().trim_end_matches('/');
        let model = self.model.trim();
        if model.starts_with("models/") {
            format!("{}/{}:generateContent", base, model)
        } else {
            format!("{}/models/{}:generateContent", base, model)
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,

    #[serde(default, alias = "inline_data")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default, alias = "mime_type")]
    mime_type: Option<String>,

    #[serde(default)]
    data: String,
}

// =============================================================================
// Backend
// =============================================================================

/// Gemini image generation over the REST API.
#[derive(Clone)]
pub struct GeminiBackend {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Create a backend with its own HTTP client.
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    /// Request body for one instruction + image turn.
    fn request_body(&self, instructions: &str, image: &ImageData) -> Value {
        let mut generation_config = json!({
            "responseModalities": ["TEXT", "IMAGE"],
        });
        if let Some(size) = self.config.image_size.as_deref() {
            generation_config["imageConfig"] = json!({ "imageSize": size });
        }

        json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": instructions },
                    {
                        "inlineData": {
                            "mimeType": image.media_type,
                            "data": image.to_base64(),
                        }
                    },
                ],
            }],
            "generationConfig": generation_config,
        })
    }
}

/// Flatten a `generateContent` response into ordered assets.
fn parse_response(body: &[u8]) -> Result<Vec<OutputAsset>, GenerationError> {
    let response: GenerateContentResponse = serde_json::from_slice(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    let mut assets = Vec::new();
    for part in response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
    {
        if let Some(inline) = part.inline_data {
            if inline.data.is_empty() {
                continue;
            }
            let bytes = BASE64
                .decode(inline.data.as_bytes())
                .map_err(|e| GenerationError::MalformedResponse(format!("inline data: {}", e)))?;
            let media_type = inline
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string());
            assets.push(OutputAsset::new(media_type, bytes));
        } else if let Some(text) = part.text {
            assets.push(OutputAsset::new("text/plain", text.into_bytes()));
        }
    }

    Ok(assets)
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn submit(
        &self,
        instructions: &str,
        image: &ImageData,
    ) -> Result<Vec<OutputAsset>, GenerationError> {
        let endpoint = self.config.endpoint();
        debug!(
            model = %self.config.model,
            image_bytes = image.len(),
            "Submitting generation request"
        );

        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(instructions, image))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout {
                        seconds: self.config.timeout.as_secs(),
                    }
                } else {
                    GenerationError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = truncate_body(&String::from_utf8_lossy(&body));
            warn!(status = status.as_u16(), "Gemini returned an error status");
            return Err(GenerationError::Vendor {
                status: status.as_u16(),
                message,
            });
        }

        parse_response(&body)
    }
}

// =============================================================================
// Tests
// =============================================================================
