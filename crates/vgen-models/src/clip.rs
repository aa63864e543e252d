//! Decomposed clip units and their results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::format::{AspectRatio, QualityTier};

/// Position a seed image occupies in a clip's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SeedRole {
    Start,
    Middle,
    End,
}

/// A still image used to seed or anchor a clip's generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SeedImage {
    pub role: SeedRole,
    pub source: SeedSource,
}

/// Where the seed image payload lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SeedSource {
    /// Publicly fetchable URL, passed through to the backend
    Url(String),
    /// Raw image bytes (e.g. an extracted continuity frame), re-encoded
    /// before transmission
    Inline(
        #[serde(with = "serde_bytes_b64")]
        #[schemars(with = "String")]
        Vec<u8>,
    ),
}

impl SeedImage {
    pub fn url(role: SeedRole, url: impl Into<String>) -> Self {
        Self {
            role,
            source: SeedSource::Url(url.into()),
        }
    }

    pub fn inline(role: SeedRole, bytes: Vec<u8>) -> Self {
        Self {
            role,
            source: SeedSource::Inline(bytes),
        }
    }
}

/// One decomposed unit of the requested video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipSpec {
    /// Position in the final stitched sequence (0-based)
    pub index: u32,

    /// Target duration of this clip in seconds
    pub duration_secs: u32,

    /// Prompt for this clip (may carry scene continuity hints)
    pub prompt: String,

    /// Optional seed images (start/middle/end keyframes)
    #[serde(default)]
    pub seed_images: Vec<SeedImage>,

    /// Quality tier inherited from the request
    #[serde(default)]
    pub quality: QualityTier,

    /// Aspect ratio inherited from the request
    #[serde(default)]
    pub aspect: AspectRatio,
}

impl ClipSpec {
    /// Seed image for a given role, if any.
    pub fn seed_for(&self, role: SeedRole) -> Option<&SeedImage> {
        self.seed_images.iter().find(|s| s.role == role)
    }
}

/// A completed clip: binary payload on disk plus its originating spec.
#[derive(Debug, Clone)]
pub struct ClipResult {
    pub spec: ClipSpec,
    /// Local path to the downloaded clip payload
    pub path: PathBuf,
    /// Payload size in bytes (verified at download time)
    pub size_bytes: u64,
}

/// A boundary frame extracted from a completed clip.
///
/// Transient: consumed immediately as the next clip's seed image.
#[derive(Debug, Clone)]
pub struct ContinuityFrame {
    /// Local path to the extracted still image
    pub path: PathBuf,
    /// Normalized temporal position the frame was taken at (1.0 = last frame)
    pub position: f64,
}

/// Transition applied between consecutive clips when stitching.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransitionMode {
    /// Hard cut, lossless container-level concatenation
    #[default]
    Cut,
    /// Cross-dissolve of the given duration between each pair
    Crossfade { duration_secs: f64 },
}

mod serde_bytes_b64 {
    //! Inline seed bytes serialize as base64 so specs stay JSON-safe.

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ClipSpec {
        ClipSpec {
            index: 0,
            duration_secs: 10,
            prompt: "a fox running through snow".into(),
            seed_images: vec![SeedImage::url(SeedRole::Start, "https://img.example/a.jpg")],
            quality: QualityTier::Basic,
            aspect: AspectRatio::Portrait,
        }
    }

    #[test]
    fn test_seed_lookup() {
        let s = spec();
        assert!(s.seed_for(SeedRole::Start).is_some());
        assert!(s.seed_for(SeedRole::End).is_none());
    }

    #[test]
    fn test_inline_seed_roundtrip() {
        let mut s = spec();
        s.seed_images = vec![SeedImage::inline(SeedRole::Start, vec![1, 2, 3, 255])];
        let json = serde_json::to_string(&s).unwrap();
        let back: ClipSpec = serde_json::from_str(&json).unwrap();
        match &back.seed_images[0].source {
            SeedSource::Inline(bytes) => assert_eq!(bytes, &vec![1, 2, 3, 255]),
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn test_transition_default_is_cut() {
        assert_eq!(TransitionMode::default(), TransitionMode::Cut);
    }

    #[test]
    fn test_clip_spec_schema_generates() {
        // inline seed bytes surface as a base64 string in the schema
        let schema = schemars::schema_for!(ClipSpec);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("seed_images"));
        assert!(json.contains("inline"));
    }
}
