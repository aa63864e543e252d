//! Clip decomposition.
//!
//! Splits a requested total duration into fixed-unit clips. Total output
//! length is the smallest multiple of the unit covering the request, so
//! callers always get at least what they asked for.

use vgen_models::{ClipSpec, ContinuityMode, GenerationRequest, SeedImage, SeedRole};

use crate::error::{WorkerError, WorkerResult};

/// Number of clips a request decomposes into.
pub fn clip_count(total_duration_secs: u32, clip_unit_secs: u32) -> usize {
    debug_assert!(clip_unit_secs > 0);
    total_duration_secs.div_ceil(clip_unit_secs) as usize
}

/// Build the clip specs for a request.
///
/// `prompts` carries one enriched prompt per clip. User-supplied reference
/// images seed every clip in independent mode; in sequential mode only the
/// first, since later clips are seeded with extracted continuity frames at
/// dispatch time.
pub fn decompose(
    request: &GenerationRequest,
    clip_unit_secs: u32,
    prompts: &[String],
) -> WorkerResult<Vec<ClipSpec>> {
    let count = clip_count(request.total_duration_secs, clip_unit_secs);
    if prompts.len() != count {
        return Err(WorkerError::invalid_request(format!(
            "{} prompts supplied for {} clips",
            prompts.len(),
            count
        )));
    }

    let reference_seeds = reference_seed_images(&request.reference_images);

    let specs = prompts
        .iter()
        .enumerate()
        .map(|(index, prompt)| {
            let seed_images = match request.continuity {
                ContinuityMode::Independent => reference_seeds.clone(),
                ContinuityMode::Sequential if index == 0 => reference_seeds.clone(),
                ContinuityMode::Sequential => Vec::new(),
            };
            ClipSpec {
                index: index as u32,
                duration_secs: clip_unit_secs,
                prompt: prompt.clone(),
                seed_images,
                quality: request.quality,
                aspect: request.aspect,
            }
        })
        .collect();

    Ok(specs)
}

/// Map up to three user reference URLs onto seed roles in order.
fn reference_seed_images(urls: &[String]) -> Vec<SeedImage> {
    const ROLES: [SeedRole; 3] = [SeedRole::Start, SeedRole::Middle, SeedRole::End];
    urls.iter()
        .zip(ROLES)
        .map(|(url, role)| SeedImage::url(role, url))
        .collect()
}
