//! Output format and quality tier definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Target aspect ratio for generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 9:16 vertical (short-form default)
    #[default]
    Portrait,
    /// 16:9 horizontal
    Landscape,
}

impl AspectRatio {
    /// Wire representation used by provider APIs ("9:16" / "16:9").
    pub fn as_ratio_str(&self) -> &'static str {
        match self {
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_ratio_str())
    }
}

/// Quality tier requested by the user.
///
/// Tiers map onto provider-specific model identifiers inside each adapter;
/// the tier itself is provider-neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    /// Fastest, cheapest tier
    #[default]
    Basic,
    /// Higher quality, 720p output
    #[serde(rename = "pro_720")]
    Pro720,
    /// Highest quality, 1080p output
    #[serde(rename = "pro_1080")]
    Pro1080,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::Basic => "basic",
            QualityTier::Pro720 => "pro_720",
            QualityTier::Pro1080 => "pro_1080",
        }
    }

    /// Whether this tier includes watermark removal where the backend
    /// supports it.
    pub fn removes_watermark(&self) -> bool {
        !matches!(self, QualityTier::Basic)
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_wire_format() {
        assert_eq!(AspectRatio::Portrait.as_ratio_str(), "9:16");
        assert_eq!(AspectRatio::Landscape.as_ratio_str(), "16:9");
        assert_eq!(AspectRatio::default(), AspectRatio::Portrait);
    }

    #[test]
    fn test_quality_tier_watermark() {
        assert!(!QualityTier::Basic.removes_watermark());
        assert!(QualityTier::Pro720.removes_watermark());
        assert!(QualityTier::Pro1080.removes_watermark());
    }

    #[test]
    fn test_quality_tier_serde() {
        let json = serde_json::to_string(&QualityTier::Pro720).unwrap();
        assert_eq!(json, "\"pro_720\"");
        let json = serde_json::to_string(&QualityTier::Pro1080).unwrap();
        assert_eq!(json, "\"pro_1080\"");

        // wire names round-trip and agree with as_str()
        for tier in [QualityTier::Basic, QualityTier::Pro720, QualityTier::Pro1080] {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{}\"", tier.as_str()));
            let back: QualityTier = serde_json::from_str(&json).unwrap();
            assert_eq!(back, tier);
        }
    }
}
