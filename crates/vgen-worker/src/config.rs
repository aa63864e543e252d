//! Worker configuration.

use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Native clip length the total duration is decomposed into (seconds)
    pub clip_unit_secs: u32,
    /// Pause between provider status checks
    pub poll_interval: Duration,
    /// Wall-clock budget per generation task
    pub poll_max_wait: Duration,
    /// Crossfade length when stitching in crossfade mode (seconds)
    pub crossfade_secs: f64,
    /// Work directory for temporary files
    pub work_dir: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            clip_unit_secs: 10,
            poll_interval: Duration::from_secs(10),
            poll_max_wait: Duration::from_secs(600),
            crossfade_secs: 0.5,
            work_dir: "/tmp/vgen".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            clip_unit_secs: std::env::var("WORKER_CLIP_UNIT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(defaults.clip_unit_secs),
            poll_interval: Duration::from_secs(
                std::env::var("WORKER_POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.poll_interval.as_secs()),
            ),
            poll_max_wait: Duration::from_secs(
                std::env::var("WORKER_POLL_MAX_WAIT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.poll_max_wait.as_secs()),
            ),
            crossfade_secs: std::env::var("WORKER_CROSSFADE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.crossfade_secs),
            work_dir: std::env::var("WORKER_WORK_DIR").unwrap_or(defaults.work_dir),
        }
    }
}
