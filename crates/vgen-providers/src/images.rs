//! Seed image preparation for transmission.
//!
//! Backends accept still images as URLs; inline payloads (extracted
//! continuity frames) are re-encoded to baseline JPEG and shipped as data
//! URLs so any capture format survives transmission.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;

use vgen_models::{SeedImage, SeedSource};

use crate::error::{ProviderError, ProviderResult};

/// JPEG quality used for seed re-encoding.
const SEED_JPEG_QUALITY: u8 = 90;

/// Re-encode arbitrary image bytes as baseline JPEG.
pub fn encode_seed_jpeg(bytes: &[u8]) -> ProviderResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ProviderError::InvalidSpec(format!("seed image is not decodable: {}", e)))?;

    let mut out = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut out, SEED_JPEG_QUALITY);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| ProviderError::InvalidSpec(format!("seed re-encoding failed: {}", e)))?;

    Ok(out)
}

/// Resolve a seed image to the URL form providers accept.
pub fn seed_to_url(seed: &SeedImage) -> ProviderResult<String> {
    match &seed.source {
        SeedSource::Url(url) => Ok(url.clone()),
        SeedSource::Inline(bytes) => {
            let jpeg = encode_seed_jpeg(bytes)?;
            Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::SeedRole;

    fn tiny_png() -> Vec<u8> {
        // 2x2 RGB image encoded through the image crate itself
        let img = image::RgbImage::from_fn(2, 2, |x, y| image::Rgb([x as u8, y as u8, 128]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_reencode_produces_jpeg() {
        let jpeg = encode_seed_jpeg(&tiny_png()).unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
    }

    #[test]
    fn test_undecodable_seed_is_invalid_spec() {
        let err = encode_seed_jpeg(b"not an image").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidSpec(_)));
    }

    #[test]
    fn test_url_seed_passes_through() {
        let seed = SeedImage::url(SeedRole::Start, "https://img.example/a.jpg");
        assert_eq!(seed_to_url(&seed).unwrap(), "https://img.example/a.jpg");
    }

    #[test]
    fn test_inline_seed_becomes_data_url() {
        let seed = SeedImage::inline(SeedRole::Start, tiny_png());
        let url = seed_to_url(&seed).unwrap();
        assert!(url.starts_with("data:image/jpeg;base64,"));
    }
}
