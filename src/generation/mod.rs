//! Image generation boundary.
//!
//! The pipeline only depends on [`GenerationClient`]: submit instruction text
//! and an image, receive the first image asset the model produced. The vendor
//! sits behind the [`GenerationBackend`] trait so it can be swapped by
//! configuration.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           GenerationClient              │
//! │   timeout + first-image selection       │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │        GenerationBackend Trait          │
//! └────────────────────┬────────────────────┘
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │ GeminiBackend   │    │  DryRunBackend      │
//! │ (generateContent│    │  (echoes the input) │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod client;
mod dry_run;
mod gemini;

pub use client::{
    select_first_image, GenerationBackend, GenerationClient, OutputAsset,
    DEFAULT_GENERATION_TIMEOUT_SECS,
};
pub use dry_run::DryRunBackend;
pub use gemini::{GeminiBackend, GeminiConfig, DEFAULT_GEMINI_API_BASE, DEFAULT_GEMINI_MODEL};
