//! FFmpeg CLI wrapper for the Vygen generation backend.
//!
//! Wraps FFmpeg/FFprobe subprocess invocations behind a narrow interface:
//! probing, continuity-frame extraction, clip download and stitching.
//! Every invocation carries an explicit wall-clock timeout; child processes
//! never block the async scheduler.

pub mod command;
pub mod download;
pub mod error;
pub mod frame;
pub mod probe;
pub mod stitch;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use download::download_to_file;
pub use error::{MediaError, MediaResult};
pub use frame::{extract_frame, frame_path_for, FrameExtractOptions};
pub use probe::{count_frames, get_duration, probe_video, VideoInfo};
pub use stitch::{read_verified, stitch, stitch_with, FfmpegStitchExec, StitchExec, StitchPlan};
