use thiserror::Error;

/// Errors from the quota counter backing store.
#[derive(Debug, Clone, Error)]
pub enum RateLimitError {
    /// The counter store could not be reached
    #[error("Rate limit backend unavailable: {0}")]
    Unavailable(String),

    /// The counter store answered with something we could not interpret
    #[error("Unexpected rate limit backend reply: {0}")]
    Protocol(String),
}

/// Upload acceptance failures. Messages are shown to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// No image was attached to the request
    #[error("No file uploaded")]
    MissingImage,

    /// Declared media type is not an image
    #[error("File must be an image")]
    NotAnImage { media_type: String },

    /// Payload exceeds the upload ceiling
    #[error(
        "File too large. Maximum size is {}. Please try a smaller image.",
        format_size(.max_bytes)
    )]
    TooLarge { size: usize, max_bytes: usize },

    /// Image payload is not valid base64
    #[error("Image data is not valid base64")]
    InvalidEncoding,

    /// Data URL could not be parsed
    #[error("Invalid data URL format")]
    InvalidDataUrl,

    /// Request body could not be read as the expected shape
    #[error("Invalid request body: {0}")]
    MalformedBody(String),
}

/// Errors from the external image generation capability.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// Network or connection error talking to the vendor
    #[error("Generation transport error: {0}")]
    Transport(String),

    /// The call did not complete within the configured timeout
    #[error("Generation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Vendor returned a non-success status
    #[error("Generation service returned {status}: {message}")]
    Vendor { status: u16, message: String },

    /// Vendor response could not be decoded
    #[error("Malformed generation response: {0}")]
    MalformedResponse(String),

    /// Response contained no image asset
    #[error("no image produced")]
    NoImageProduced,
}

/// Errors from blob uploads and result record persistence.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Blob upload failed
    #[error("Blob upload failed for {key}: {message}")]
    Upload { key: String, message: String },

    /// Record write failed
    #[error("Record write failed for {key}: {message}")]
    Write { key: String, message: String },

    /// Record read failed
    #[error("Record read failed for {key}: {message}")]
    Read { key: String, message: String },

    /// A record already exists under the freshly generated id
    #[error("Result id collision: {0}")]
    IdCollision(String),

    /// Stored record could not be decoded
    #[error("Malformed result record {key}: {message}")]
    MalformedRecord { key: String, message: String },
}

/// Failures of a single pipeline run, one variant per caller-visible class.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Upload was malformed, missing, oversized or not an image
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Identifier has no quota left in the current window
    #[error("Daily limit of {limit} reached, resets in {retry_after_secs}s")]
    QuotaExceeded {
        limit: u32,
        reset: u64,
        retry_after_secs: u64,
    },

    /// Quota could not be checked; treated as a refusal
    #[error(transparent)]
    RateLimiter(#[from] RateLimitError),

    /// Generation call failed or produced no image
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Generated image could not be durably saved
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl PipelineError {
    /// Message shown to the caller.
    ///
    /// Validation and quota messages are specific; backend failures map to
    /// fixed texts so vendor and storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            PipelineError::Validation(e) => e.to_string(),
            PipelineError::QuotaExceeded {
                limit,
                retry_after_secs,
                ..
            } => format!(
                "You've reached the daily limit of {} images. Try again in {}.",
                limit,
                format_wait(*retry_after_secs)
            ),
            PipelineError::RateLimiter(_) => {
                "Unable to check your remaining quota. Please try again later.".to_string()
            }
            PipelineError::Generation(_) => {
                "Failed to generate image. Please try again.".to_string()
            }
            PipelineError::Persistence(_) => {
                "Failed to save your image. Please try again.".to_string()
            }
        }
    }
}

/// Exact size in the largest unit that divides it: `3MB`, `512KB` or `1500000 bytes`.
fn format_size(bytes: &usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * 1024;
    match *bytes {
        0 => "0 bytes".to_string(),
        b if b % MIB == 0 => format!("{}MB", b / MIB),
        b if b % KIB == 0 => format!("{}KB", b / KIB),
        b => format!("{} bytes", b),
    }
}

/// Human-readable wait such as `3h 20m` or `5m`.
fn format_wait(secs: u64) -> String {
    let minutes = secs.div_ceil(60).max(1);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    match (hours, minutes) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}
