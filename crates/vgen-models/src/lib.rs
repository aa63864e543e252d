//! Shared data models for the Vygen generation backend.
//!
//! This crate provides Serde-serializable types for:
//! - Generation requests and quality tiers
//! - Decomposed clip specs and results
//! - Provider task handles and statuses
//! - Job lifecycle records

pub mod clip;
pub mod format;
pub mod job;
pub mod request;
pub mod task;

// Re-export common types
pub use clip::{ClipResult, ClipSpec, ContinuityFrame, SeedImage, SeedRole, SeedSource, TransitionMode};
pub use format::{AspectRatio, QualityTier};
pub use job::{JobId, JobRecord, JobResult, JobStatus};
pub use request::{ContinuityMode, GenerationRequest, ProviderPolicy, MAX_REFERENCE_IMAGES};
pub use task::{ProviderKind, ResultLocator, TaskHandle, TaskStatus};
