//! Cloudflare R2 storage client.
//!
//! This crate provides:
//! - File and byte upload to R2 with public URL mapping
//! - Re-hosting of expiring provider result URLs
//! - The bucket key layout for job outputs

pub mod client;
pub mod error;
pub mod keys;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use keys::{job_prefix, output_key, thumbnail_key};
