//! Top-level generation request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::format::{AspectRatio, QualityTier};
use crate::task::ProviderKind;

/// Upper bound on reference images accepted per request.
///
/// Matches the most permissive backend (three ordered keyframes).
pub const MAX_REFERENCE_IMAGES: usize = 3;

/// How the backend for a request is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderPolicy {
    /// Route based on request shape (reference images need a
    /// keyframe-capable backend)
    #[default]
    Auto,
    /// Pin every clip to one backend
    Fixed(ProviderKind),
}

/// Whether decomposed clips must be visually continuous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContinuityMode {
    /// Clips are generated concurrently with no cross-clip seeding
    #[default]
    Independent,
    /// Each clip is seeded with the previous clip's boundary frame
    Sequential,
}

/// Immutable input for one end-to-end generation run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GenerationRequest {
    /// Requesting user (ledger identity)
    pub user_id: String,

    /// Free-text prompt describing the video
    #[validate(length(min = 1, max = 5000))]
    pub prompt: String,

    /// Target total duration in seconds (must be positive)
    #[validate(range(min = 1))]
    pub total_duration_secs: u32,

    /// Requested quality tier
    #[serde(default)]
    pub quality: QualityTier,

    /// Ordered reference image URLs (bounded count)
    #[serde(default)]
    #[validate(length(max = 3), custom(function = "validate_reference_urls"))]
    pub reference_images: Vec<String>,

    /// Target aspect ratio
    #[serde(default)]
    pub aspect: AspectRatio,

    /// Backend selection policy
    #[serde(default)]
    pub provider: ProviderPolicy,

    /// Continuity requirement across decomposed clips
    #[serde(default)]
    pub continuity: ContinuityMode,
}

fn validate_reference_urls(urls: &[String]) -> Result<(), validator::ValidationError> {
    for u in urls {
        url::Url::parse(u).map_err(|_| validator::ValidationError::new("invalid_reference_url"))?;
    }
    Ok(())
}

impl GenerationRequest {
    /// Minimal request with defaults for everything but the essentials.
    pub fn new(
        user_id: impl Into<String>,
        prompt: impl Into<String>,
        total_duration_secs: u32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            prompt: prompt.into(),
            total_duration_secs,
            quality: QualityTier::default(),
            reference_images: Vec::new(),
            aspect: AspectRatio::default(),
            provider: ProviderPolicy::default(),
            continuity: ContinuityMode::default(),
        }
    }
}
