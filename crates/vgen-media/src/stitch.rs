//! Clip stitching: cut concatenation and crossfade transitions.
//!
//! Cut mode concatenates losslessly through the concat demuxer and requires
//! compatible codec/container profiles across inputs. Crossfade mode builds
//! an `xfade` filter graph between consecutive pairs and re-encodes; audio
//! tracks are concatenated without blending. A crossfade failure falls back
//! to cut mode exactly once; a cut failure is fatal.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use vgen_models::TransitionMode;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::get_duration;

/// Wall-clock bound for a stitch invocation.
const STITCH_TIMEOUT_SECS: u64 = 600;

/// Execution seam for stitch operations.
///
/// The production implementation shells out to ffmpeg/ffprobe; tests
/// substitute a scripted executor to exercise the fallback paths.
#[async_trait]
pub trait StitchExec: Send + Sync {
    /// Probed duration of one clip in seconds.
    async fn clip_duration(&self, clip: &Path) -> MediaResult<f64>;

    /// Run one ffmpeg invocation to completion.
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Production executor backed by the ffmpeg/ffprobe binaries.
#[derive(Debug, Default)]
pub struct FfmpegStitchExec;

#[async_trait]
impl StitchExec for FfmpegStitchExec {
    async fn clip_duration(&self, clip: &Path) -> MediaResult<f64> {
        get_duration(clip).await
    }

    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        FfmpegRunner::new()
            .with_timeout(STITCH_TIMEOUT_SECS)
            .run(cmd)
            .await
    }
}

/// Ordered stitch input with a transition mode and output target.
#[derive(Debug, Clone)]
pub struct StitchPlan {
    clips: Vec<PathBuf>,
    pub transition: TransitionMode,
    pub output: PathBuf,
}

impl StitchPlan {
    /// Build a plan. The clip sequence must be non-empty.
    pub fn new(
        clips: Vec<PathBuf>,
        transition: TransitionMode,
        output: impl AsRef<Path>,
    ) -> MediaResult<Self> {
        if clips.is_empty() {
            return Err(MediaError::stitch_failed("stitch plan has no clips"));
        }
        Ok(Self {
            clips,
            transition,
            output: output.as_ref().to_path_buf(),
        })
    }

    pub fn clips(&self) -> &[PathBuf] {
        &self.clips
    }
}

/// Execute a stitch plan with the production executor. Returns the
/// verified output size in bytes.
pub async fn stitch(plan: &StitchPlan) -> MediaResult<u64> {
    stitch_with(&FfmpegStitchExec, plan).await
}

/// Execute a stitch plan through the given executor.
pub async fn stitch_with(exec: &dyn StitchExec, plan: &StitchPlan) -> MediaResult<u64> {
    // Single clip degenerates to a pass-through copy
    if plan.clips.len() == 1 {
        tokio::fs::copy(&plan.clips[0], &plan.output).await?;
        return verify_output(&plan.output);
    }

    match plan.transition {
        TransitionMode::Cut => concat_cut(exec, &plan.clips, &plan.output).await,
        TransitionMode::Crossfade { duration_secs } => {
            match concat_crossfade(exec, &plan.clips, &plan.output, duration_secs).await {
                Ok(size) => Ok(size),
                Err(e) => {
                    // One automatic retry with plain cuts; most content is
                    // acceptable, most seams are not.
                    warn!("Crossfade stitch failed ({}), retrying with cut mode", e);
                    concat_cut(exec, &plan.clips, &plan.output).await.map_err(|e2| {
                        MediaError::stitch_failed(format!(
                            "cut fallback failed after crossfade failure: {}",
                            e2
                        ))
                    })
                }
            }
        }
    }
}

/// Lossless container-level concatenation via the concat demuxer.
async fn concat_cut(exec: &dyn StitchExec, clips: &[PathBuf], output: &Path) -> MediaResult<u64> {
    info!("Concatenating {} clips (cut mode)", clips.len());

    let dir = tempfile::tempdir()?;
    let list_path = dir.path().join("filelist.txt");

    let mut list = String::new();
    for clip in clips {
        if !clip.exists() {
            return Err(MediaError::FileNotFound(clip.clone()));
        }
        // single quotes inside paths must be closed-escaped-reopened
        let escaped = clip.to_string_lossy().replace('\'', "'\\''");
        list.push_str(&format!("file '{}'\n", escaped));
    }
    tokio::fs::write(&list_path, list).await?;

    let cmd = FfmpegCommand::new(&list_path, output)
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .codec_copy();

    exec.run(&cmd)
        .await
        .map_err(|e| MediaError::stitch_failed(format!("cut concatenation failed: {}", e)))?;

    verify_output(output)
}

/// Crossfade concatenation via an xfade filter graph.
///
/// Offsets are computed from each clip's probed duration minus the overlap
/// already consumed by prior transitions. Audio is concatenated directly.
async fn concat_crossfade(
    exec: &dyn StitchExec,
    clips: &[PathBuf],
    output: &Path,
    fade_secs: f64,
) -> MediaResult<u64> {
    info!(
        "Concatenating {} clips (crossfade mode, {:.2}s fade)",
        clips.len(),
        fade_secs
    );

    let mut durations = Vec::with_capacity(clips.len());
    for clip in clips {
        durations.push(exec.clip_duration(clip).await?);
    }

    let filter = build_xfade_filter(&durations, fade_secs);

    let mut cmd = FfmpegCommand::new(&clips[0], output);
    for clip in &clips[1..] {
        cmd = cmd.add_input(clip);
    }

    let last_video = format!("[v{}]", clips.len() - 1);
    let cmd = cmd
        .filter_complex(filter)
        .output_args(["-map", last_video.as_str(), "-map", "[aout]"])
        .video_codec("libx264")
        .output_args(["-preset", "veryfast", "-crf", "18"])
        .audio_codec("aac");

    exec.run(&cmd).await?;

    verify_output(output)
}

/// Build the combined video-xfade / audio-concat filter graph.
fn build_xfade_filter(durations: &[f64], fade_secs: f64) -> String {
    let n = durations.len();
    let mut parts = Vec::new();

    // video chain: [0:v] + [1:v] -> [v1]; [v1] + [2:v] -> [v2]; ...
    let mut offset = 0.0;
    let mut prev = "[0:v]".to_string();
    for i in 1..n {
        // each fade eats into the preceding clip's tail
        offset += durations[i - 1] - fade_secs;
        let out = format!("[v{}]", i);
        parts.push(format!(
            "{}[{}:v]xfade=transition=fade:duration={:.3}:offset={:.3}{}",
            prev, i, fade_secs, offset, out
        ));
        prev = out;
    }

    // audio: plain concat, no crossfade
    let audio_inputs: String = (0..n).map(|i| format!("[{}:a]", i)).collect();
    parts.push(format!("{}concat=n={}:v=0:a=1[aout]", audio_inputs, n));

    parts.join(";")
}

/// Confirm the output exists and is non-empty; returns its size.
fn verify_output(path: &Path) -> MediaResult<u64> {
    let meta = std::fs::metadata(path).map_err(|_| MediaError::EmptyOutput(path.to_path_buf()))?;
    if meta.len() == 0 {
        return Err(MediaError::EmptyOutput(path.to_path_buf()));
    }
    Ok(meta.len())
}

/// Read a stitched output back, confirming the byte count matches what was
/// written to disk.
pub async fn read_verified(path: impl AsRef<Path>, expected_size: u64) -> MediaResult<Vec<u8>> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    if bytes.len() as u64 != expected_size {
        return Err(MediaError::stitch_failed(format!(
            "output size mismatch for {}: read {} bytes, expected {}",
            path.display(),
            bytes.len(),
            expected_size
        )));
    }
    Ok(bytes)
}
