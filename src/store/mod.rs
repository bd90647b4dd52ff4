//! Persistence of before/after result pairs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ResultStore                          │
//! │   id allocation, concurrent uploads, commit-point record    │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!      ┌──────────────────┐           ┌──────────────────┐
//!      │ BlobStore Trait  │           │ RecordStore Trait│
//!      │ (public images)  │           │ (TTL key-value)  │
//!      └────────┬─────────┘           └────────┬─────────┘
//!         ┌─────┴──────┐                 ┌─────┴──────┐
//!         ▼            ▼                 ▼            ▼
//!   S3BlobStore  MemoryBlobStore  RedisRecordStore MemoryRecordStore
//! ```
//!
//! Both images are uploaded before the record is written. The record write is
//! the commit point: a result is visible only once it references two assets
//! that exist.

mod blob;
mod record;
mod redis_records;
mod results;
mod s3;

pub use blob::{BlobStore, MemoryBlobStore};
pub use record::{MemoryRecordStore, RecordStore};
pub use redis_records::RedisRecordStore;
pub use results::{
    generate_id, is_valid_id, PhotoResult, ResultStore, DEFAULT_RESULT_TTL_SECS, ID_ALPHABET,
    ID_LENGTH,
};
pub use s3::{create_s3_client, default_public_base_url, S3BlobStore};
