//! Clip dispatch.
//!
//! Two strategies over the same per-clip pipeline (submit, poll to
//! terminal, download): parallel fan-out for independent clips and a
//! strictly ordered chain for continuity mode, where each clip is seeded
//! with the last frame of the one before it.

use std::path::{Path, PathBuf};

use futures::future::try_join_all;
use tracing::{debug, info};

use vgen_media::frame::{extract_frame, frame_path_for, FrameExtractOptions};
use vgen_models::{ClipResult, ClipSpec, SeedImage, SeedRole, TaskHandle};
use vgen_providers::{
    call_with_retry, poll_until_complete, PollConfig, ProviderError, RetryPolicy, VideoProvider,
};

use crate::error::WorkerResult;

/// Shared context for one job's dispatch.
pub struct DispatchContext<'a> {
    pub provider: &'a dyn VideoProvider,
    pub http: &'a reqwest::Client,
    pub poll_config: &'a PollConfig,
    pub work_dir: &'a Path,
}

impl<'a> DispatchContext<'a> {
    fn clip_path(&self, index: u32) -> PathBuf {
        self.work_dir.join(format!("clip_{:03}.mp4", index))
    }

    /// Run one clip through submit, poll, and download.
    async fn generate_clip(&self, spec: &ClipSpec) -> WorkerResult<ClipResult> {
        let policy = RetryPolicy::new(format!("submit clip {}", spec.index));
        let handle: TaskHandle = call_with_retry(&policy, ProviderError::is_retryable, || {
            self.provider.submit(spec)
        })
        .await?;

        debug!(
            "Clip {} submitted to {} as {}",
            spec.index, handle.provider, handle.task_id
        );

        let result = poll_until_complete(self.provider, &handle, self.poll_config).await?;

        let path = self.clip_path(spec.index);
        let size_bytes =
            vgen_media::download_to_file(self.http, result.as_url(), &path).await?;

        info!("Clip {} downloaded ({} bytes)", spec.index, size_bytes);
        Ok(ClipResult {
            spec: spec.clone(),
            path,
            size_bytes,
        })
    }

    /// Generate all clips concurrently.
    ///
    /// The first failure abandons the whole batch; sibling tasks keep
    /// running at the provider but are no longer awaited, and no partial
    /// output survives.
    pub async fn dispatch_parallel(&self, specs: &[ClipSpec]) -> WorkerResult<Vec<ClipResult>> {
        info!("Dispatching {} clips in parallel", specs.len());

        let futures = specs.iter().map(|spec| self.generate_clip(spec));
        let mut results = try_join_all(futures).await?;
        results.sort_by_key(|r| r.spec.index);
        Ok(results)
    }

    /// Generate clips one at a time, seeding each with the previous
    /// clip's final frame.
    pub async fn dispatch_sequential(&self, specs: &[ClipSpec]) -> WorkerResult<Vec<ClipResult>> {
        info!("Dispatching {} clips sequentially", specs.len());

        let mut results: Vec<ClipResult> = Vec::with_capacity(specs.len());

        for spec in specs {
            let mut spec = spec.clone();
            if let Some(previous) = results.last() {
                let seed = self.continuity_seed(previous).await?;
                // continuity frame takes the start slot; user references
                // stay behind it if present
                spec.seed_images.insert(0, seed);
            }
            let result = self.generate_clip(&spec).await?;
            results.push(result);
        }

        Ok(results)
    }

    async fn continuity_seed(&self, previous: &ClipResult) -> WorkerResult<SeedImage> {
        let frame_path = frame_path_for(&previous.path);
        let frame = extract_frame(
            &previous.path,
            &frame_path,
            &FrameExtractOptions::default(),
        )
        .await?;

        let bytes = tokio::fs::read(&frame.path).await?;
        debug!(
            "Continuity frame for clip {} ({} bytes)",
            previous.spec.index + 1,
            bytes.len()
        );
        Ok(SeedImage::inline(SeedRole::Start, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use vgen_models::{AspectRatio, ProviderKind, QualityTier, ResultLocator, TaskStatus};
    use vgen_providers::ProviderResult;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Provider that completes every task immediately with the given URL,
    /// optionally failing a specific clip index at submit time.
    struct Immediate {
        url: String,
        fail_index: Option<u32>,
        submits: AtomicU32,
    }

    #[async_trait::async_trait]
    impl VideoProvider for Immediate {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Sora
        }

        fn round_duration(&self, requested_secs: u32) -> u32 {
            requested_secs
        }

        async fn submit(&self, spec: &ClipSpec) -> ProviderResult<TaskHandle> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            if self.fail_index == Some(spec.index) {
                return Err(ProviderError::InvalidSpec("scripted failure".into()));
            }
            Ok(TaskHandle::new(ProviderKind::Sora, format!("t-{}", spec.index)))
        }

        async fn poll(&self, _handle: &TaskHandle) -> ProviderResult<TaskStatus> {
            Ok(TaskStatus::Succeeded {
                result: ResultLocator::Url(self.url.clone()),
            })
        }
    }

    fn specs(n: u32) -> Vec<ClipSpec> {
        (0..n)
            .map(|index| ClipSpec {
                index,
                duration_secs: 10,
                prompt: format!("scene {}", index),
                seed_images: Vec::new(),
                quality: QualityTier::Basic,
                aspect: AspectRatio::Portrait,
            })
            .collect()
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(500),
        }
    }

    async fn clip_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_parallel_dispatch_collects_in_order() {
        let server = clip_server().await;
        let provider = Immediate {
            url: format!("{}/clip.mp4", server.uri()),
            fail_index: None,
            submits: AtomicU32::new(0),
        };
        let dir = tempfile::tempdir().unwrap();
        let http = reqwest::Client::new();
        let poll = fast_poll();
        let ctx = DispatchContext {
            provider: &provider,
            http: &http,
            poll_config: &poll,
            work_dir: dir.path(),
        };

        let results = ctx.dispatch_parallel(&specs(3)).await.unwrap();
        assert_eq!(results.len(), 3);
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.spec.index, i as u32);
            assert_eq!(r.size_bytes, 64);
            assert!(r.path.exists());
        }
        assert_eq!(provider.submits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_parallel_dispatch_abandons_batch_on_failure() {
        let server = clip_server().await;
        let provider = Immediate {
            url: format!("{}/clip.mp4", server.uri()),
            fail_index: Some(1),
            submits: AtomicU32::new(0),
        };
        let dir = tempfile::tempdir().unwrap();
        let http = reqwest::Client::new();
        let poll = fast_poll();
        let ctx = DispatchContext {
            provider: &provider,
            http: &http,
            poll_config: &poll,
            work_dir: dir.path(),
        };

        let err = ctx.dispatch_parallel(&specs(3)).await.unwrap_err();
        assert!(err.to_string().contains("scripted failure"));
    }
}
