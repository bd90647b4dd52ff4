//! Configuration management for the photo service.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `FESTIVE_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use festive_photo::config::{Cli, Command};
//!
//! match Cli::parse().into_command() {
//!     Command::Serve(config) => println!("Listening on {}", config.bind_address()),
//!     Command::Check(config) => println!("Checking {:?}", config.redis_url),
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `FESTIVE_HOST` - Server bind address (default: 0.0.0.0)
//! - `FESTIVE_PORT` - Server port (default: 3000)
//! - `FESTIVE_PUBLIC_URL` - Public base URL for share links (default: http://localhost:3000)
//! - `FESTIVE_REDIS_URL` - Redis for quota counters and result records (default: in memory)
//! - `FESTIVE_S3_BUCKET` - S3 bucket for images (default: in memory)
//! - `FESTIVE_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `FESTIVE_S3_REGION` - AWS region (default: us-east-1)
//! - `FESTIVE_S3_PUBLIC_URL` - Public base URL for stored images
//! - `FESTIVE_GENERATOR` - `gemini` or `dry-run` (default: gemini)
//! - `GEMINI_API_KEY` - Gemini API key
//! - `FESTIVE_GEMINI_MODEL`, `FESTIVE_GEMINI_API_BASE`, `FESTIVE_GEMINI_IMAGE_SIZE`
//! - `FESTIVE_GENERATION_TIMEOUT` - Generation timeout in seconds (default: 120)
//! - `FESTIVE_RATE_LIMIT` - Generations per window (default: 2)
//! - `FESTIVE_RATE_LIMIT_WINDOW` - Window length in seconds (default: 86400)
//! - `FESTIVE_RATE_LIMIT_PREFIX` - Counter key prefix (default: christmas-photo)
//! - `FESTIVE_RESULT_TTL` - Result retention in seconds (default: 30 days)
//! - `FESTIVE_MAX_UPLOAD_BYTES` - Upload ceiling (default: 3 MiB)
//! - `FESTIVE_MAX_DIMENSION` - Bound on the larger image side (default: 1024)
//! - `FESTIVE_QUALITY` - Lossy encoding quality (default: 0.85)
//! - `FESTIVE_CORS_ORIGINS` - Allowed CORS origins, comma separated

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::generation::{
    GeminiConfig, DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL, DEFAULT_GENERATION_TIMEOUT_SECS,
};
use crate::media::{ImagePreprocessor, DEFAULT_MAX_DIMENSION, DEFAULT_QUALITY, MAX_UPLOAD_BYTES};
use crate::ratelimit::{
    RateLimitPolicy, DEFAULT_RATE_LIMIT, DEFAULT_RATE_LIMIT_PREFIX, DEFAULT_RATE_LIMIT_WINDOW_SECS,
};
use crate::store::{default_public_base_url, DEFAULT_RESULT_TTL_SECS};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default public URL of the service.
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

// =============================================================================
// CLI Arguments
// =============================================================================

/// Festive Photo - Christmas photo transformations with a daily quota.
#[derive(Parser, Debug, Clone)]
#[command(name = "festive-photo")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Serve options when no subcommand is given
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The command to run; `serve` when none was named.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve(ServeConfig),

    /// Verify connectivity to the configured Redis and S3 backends
    Check(CheckConfig),
}

/// Image generation backend.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Google Gemini image generation
    Gemini,

    /// Return the uploaded image unchanged (local development)
    DryRun,
}

/// Options for the `serve` command.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "FESTIVE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "FESTIVE_PORT")]
    pub port: u16,

    /// Public base URL of this service, used in share links.
    #[arg(long, default_value = DEFAULT_PUBLIC_URL, env = "FESTIVE_PUBLIC_URL")]
    pub public_url: String,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Redis URL for quota counters and result records.
    ///
    /// If not specified, both are kept in process memory.
    #[arg(long, env = "FESTIVE_REDIS_URL")]
    pub redis_url: Option<String>,

    /// S3 bucket for original and generated images.
    ///
    /// If not specified, images are kept in memory and served under /blobs.
    #[arg(long, env = "FESTIVE_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "FESTIVE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "FESTIVE_S3_REGION")]
    pub s3_region: String,

    /// Public base URL for stored images (CDN or bucket website).
    #[arg(long, env = "FESTIVE_S3_PUBLIC_URL")]
    pub s3_public_url: Option<String>,

    // =========================================================================
    // Generation Configuration
    // =========================================================================
    /// Image generation backend.
    #[arg(long, value_enum, default_value_t = GeneratorKind::Gemini, env = "FESTIVE_GENERATOR")]
    pub generator: GeneratorKind,

    /// Gemini API key (required for the gemini generator).
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Gemini model name.
    #[arg(long, default_value = DEFAULT_GEMINI_MODEL, env = "FESTIVE_GEMINI_MODEL")]
    pub gemini_model: String,

    /// Gemini REST API base URL.
    #[arg(long, default_value = DEFAULT_GEMINI_API_BASE, env = "FESTIVE_GEMINI_API_BASE")]
    pub gemini_api_base: String,

    /// Requested output image size (e.g. 1K, 2K).
    #[arg(long, env = "FESTIVE_GEMINI_IMAGE_SIZE")]
    pub gemini_image_size: Option<String>,

    /// Generation timeout in seconds.
    #[arg(
        long,
        default_value_t = DEFAULT_GENERATION_TIMEOUT_SECS,
        env = "FESTIVE_GENERATION_TIMEOUT"
    )]
    pub generation_timeout: u64,

    // =========================================================================
    // Quota Configuration
    // =========================================================================
    /// Generations allowed per client per window.
    #[arg(long, default_value_t = DEFAULT_RATE_LIMIT, env = "FESTIVE_RATE_LIMIT")]
    pub rate_limit: u32,

    /// Rate limit window length in seconds.
    #[arg(
        long,
        default_value_t = DEFAULT_RATE_LIMIT_WINDOW_SECS,
        env = "FESTIVE_RATE_LIMIT_WINDOW"
    )]
    pub rate_limit_window: u64,

    /// Key prefix for quota counters.
    #[arg(long, default_value = DEFAULT_RATE_LIMIT_PREFIX, env = "FESTIVE_RATE_LIMIT_PREFIX")]
    pub rate_limit_prefix: String,

    // =========================================================================
    // Result and Image Configuration
    // =========================================================================
    /// How long results stay retrievable, in seconds.
    #[arg(long, default_value_t = DEFAULT_RESULT_TTL_SECS, env = "FESTIVE_RESULT_TTL")]
    pub result_ttl: u64,

    /// Largest accepted upload in bytes.
    #[arg(long, default_value_t = MAX_UPLOAD_BYTES, env = "FESTIVE_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Bound on the larger image side in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "FESTIVE_MAX_DIMENSION")]
    pub max_dimension: u32,

    /// Lossy encoding quality in (0, 1].
    #[arg(long, default_value_t = DEFAULT_QUALITY, env = "FESTIVE_QUALITY")]
    pub quality: f32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "FESTIVE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.generator == GeneratorKind::Gemini
            && self.gemini_api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(
                "The gemini generator needs an API key. \
                 Set --gemini-api-key or GEMINI_API_KEY, or use --generator=dry-run"
                    .to_string(),
            );
        }

        if matches!(self.s3_bucket.as_deref(), Some("")) {
            return Err("S3 bucket name must not be empty".to_string());
        }

        check_http_url("public_url", &self.public_url)?;
        check_http_url("gemini_api_base", &self.gemini_api_base)?;
        if let Some(ref endpoint) = self.s3_endpoint {
            check_http_url("s3_endpoint", endpoint)?;
        }
        if let Some(ref public) = self.s3_public_url {
            check_http_url("s3_public_url", public)?;
        }

        if self.rate_limit == 0 {
            return Err("rate_limit must be greater than 0".to_string());
        }
        if self.rate_limit_window == 0 {
            return Err("rate_limit_window must be greater than 0".to_string());
        }
        if self.result_ttl == 0 {
            return Err("result_ttl must be greater than 0".to_string());
        }
        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }
        if self.max_dimension == 0 {
            return Err("max_dimension must be greater than 0".to_string());
        }
        if self.generation_timeout == 0 {
            return Err("generation_timeout must be greater than 0".to_string());
        }

        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err("quality must be greater than 0 and at most 1".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Quota policy from the rate limit options.
    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.rate_limit, Duration::from_secs(self.rate_limit_window))
            .with_prefix(self.rate_limit_prefix.clone())
    }

    pub fn preprocessor(&self) -> ImagePreprocessor {
        ImagePreprocessor::new(self.max_dimension, self.quality)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout)
    }

    /// Gemini settings, when an API key is configured.
    pub fn gemini_config(&self) -> Option<GeminiConfig> {
        let api_key = self.gemini_api_key.as_deref()?;
        Some(
            GeminiConfig::new(api_key)
                .with_model(self.gemini_model.clone())
                .with_api_base(self.gemini_api_base.clone())
                .with_image_size(self.gemini_image_size.clone())
                .with_timeout(self.generation_timeout()),
        )
    }

    /// Base URL for public object links, when an S3 bucket is configured.
    pub fn s3_public_base_url(&self) -> Option<String> {
        let bucket = self.s3_bucket.as_deref()?;
        Some(self.s3_public_url.clone().unwrap_or_else(|| {
            default_public_base_url(bucket, self.s3_endpoint.as_deref(), &self.s3_region)
        }))
    }
}

/// Options for the `check` command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    /// Redis URL to test.
    #[arg(long, env = "FESTIVE_REDIS_URL")]
    pub redis_url: Option<String>,

    /// S3 bucket to test.
    #[arg(long, env = "FESTIVE_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL.
    #[arg(long, env = "FESTIVE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "FESTIVE_S3_REGION")]
    pub s3_region: String,

    /// Enable verbose logging.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Require an absolute http(s) URL; share links and image URLs are built on it.
fn check_http_url(name: &str, value: &str) -> Result<(), String> {
    let parsed = url::Url::parse(value)
        .map_err(|e| format!("{} is not a valid URL ({}): {}", name, e, value))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{} must use http or https, got '{}'", name, other)),
    }
}

// =============================================================================
// Tests
// =============================================================================
