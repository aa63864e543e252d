//! Continuity frame extraction.
//!
//! Derives a single still image from a clip at a normalized temporal
//! position. The near-end case seeks backwards from EOF, which holds up
//! better against duration rounding than seeking forward to `duration - ε`;
//! if that yields nothing the exact final frame is selected by index.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use vgen_models::ContinuityFrame;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{count_frames, get_duration};

/// Wall-clock bound for a single extraction invocation.
const EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Backwards seek offset used for last-frame extraction.
const SEEK_FROM_END_SECS: f64 = -0.1;

/// Positions at or beyond this are treated as "last frame".
const NEAR_END_THRESHOLD: f64 = 0.999;

/// Options for frame extraction.
#[derive(Debug, Clone)]
pub struct FrameExtractOptions {
    /// Normalized position in [0, 1]; 1.0 means last frame
    pub position: f64,
}

impl Default for FrameExtractOptions {
    fn default() -> Self {
        Self { position: 1.0 }
    }
}

/// Extract a still frame from `video` at the given normalized position,
/// writing a JPEG to `output`.
pub async fn extract_frame(
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
    opts: &FrameExtractOptions,
) -> MediaResult<ContinuityFrame> {
    let video = video.as_ref();
    let output = output.as_ref();

    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }

    let position = opts.position.clamp(0.0, 1.0);

    if position >= NEAR_END_THRESHOLD {
        extract_last_frame(video, output).await?;
    } else {
        let duration = get_duration(video).await?;
        // cap below 1.0 so the seek target stays inside the stream
        let t = duration * position.min(0.999);
        extract_at(video, output, t).await?;
        verify_frame(output)?;
    }

    Ok(ContinuityFrame {
        path: output.to_path_buf(),
        position,
    })
}

/// Extract the final frame of a clip.
///
/// Primary method seeks a small offset back from EOF. If the output is
/// empty or missing, fall back to counting frames and selecting the final
/// index exactly.
async fn extract_last_frame(video: &Path, output: &Path) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video, output)
        .seek_from_end(SEEK_FROM_END_SECS)
        .single_frame()
        .output_arg("-q:v")
        .output_arg("2");

    let primary = FfmpegRunner::new()
        .with_timeout(EXTRACT_TIMEOUT_SECS)
        .run(&cmd)
        .await;

    match primary.and_then(|_| verify_frame(output)) {
        Ok(()) => {
            debug!("Last frame extracted via -sseof: {}", output.display());
            return Ok(());
        }
        Err(e) => {
            warn!(
                "Seek-from-end extraction produced no frame ({}), falling back to frame index",
                e
            );
        }
    }

    let total = count_frames(video).await.map_err(|e| {
        MediaError::frame_extraction(format!("frame count for fallback failed: {}", e))
    })?;
    if total == 0 {
        return Err(MediaError::frame_extraction(format!(
            "{} contains no video frames",
            video.display()
        )));
    }

    let select = format!("select='eq(n\\,{})'", total - 1);
    let cmd = FfmpegCommand::new(video, output)
        .video_filter(select)
        .output_arg("-fps_mode")
        .output_arg("passthrough")
        .single_frame()
        .output_arg("-q:v")
        .output_arg("2");

    FfmpegRunner::new()
        .with_timeout(EXTRACT_TIMEOUT_SECS)
        .run(&cmd)
        .await
        .map_err(|e| MediaError::frame_extraction(format!("final-frame fallback failed: {}", e)))?;

    verify_frame(output)
}

/// Extract a frame at an absolute timestamp.
async fn extract_at(video: &Path, output: &Path, seconds: f64) -> MediaResult<()> {
    let cmd = FfmpegCommand::new(video, output)
        .seek(seconds)
        .single_frame()
        .output_arg("-q:v")
        .output_arg("2");

    FfmpegRunner::new()
        .with_timeout(EXTRACT_TIMEOUT_SECS)
        .run(&cmd)
        .await
        .map_err(|e| MediaError::frame_extraction(format!("extraction at {:.3}s failed: {}", seconds, e)))
}

/// A frame file must exist and be non-empty to count as extracted.
fn verify_frame(path: &Path) -> MediaResult<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(MediaError::frame_extraction(format!(
            "extracted frame is empty: {}",
            path.display()
        ))),
        Err(_) => Err(MediaError::frame_extraction(format!(
            "no frame written to {}",
            path.display()
        ))),
    }
}

/// Scratch path for a continuity frame next to a clip.
pub fn frame_path_for(clip: &Path) -> PathBuf {
    clip.with_extension("last.jpg")
}
