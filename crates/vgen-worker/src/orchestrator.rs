//! Job orchestration.
//!
//! `run_generation` drives one request through its whole lifecycle:
//! ledger record, prompt enrichment, decomposition, dispatch, stitch,
//! upload, completion, credit debit. Any failure lands the job in the
//! failed state with the error recorded verbatim and no credits debited.

use std::path::Path;

use metrics::counter;
use tracing::{info, warn, Instrument};
use validator::Validate;

use vgen_ledger::{CreditsRepository, JobRepository, LedgerClient};
use vgen_media::{extract_frame, read_verified, stitch, FrameExtractOptions, StitchPlan};
use vgen_models::{
    ClipResult, ContinuityMode, GenerationRequest, JobRecord, JobResult, ProviderKind,
    ProviderPolicy, TransitionMode,
};
use vgen_providers::{PollConfig, SoraClient, VeoClient, VideoProvider};
use vgen_storage::{output_key, thumbnail_key, R2Client};

use crate::config::WorkerConfig;
use crate::decompose::{clip_count, decompose};
use crate::dispatch::DispatchContext;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::script::ScriptClient;

/// Owns every collaborator a job needs.
pub struct Orchestrator {
    config: WorkerConfig,
    http: reqwest::Client,
    sora: Box<dyn VideoProvider>,
    veo: Box<dyn VideoProvider>,
    storage: R2Client,
    jobs: JobRepository,
    credits: CreditsRepository,
    script: ScriptClient,
}

impl Orchestrator {
    /// Wire up all collaborators from the environment.
    pub async fn from_env(config: WorkerConfig) -> WorkerResult<Self> {
        let ledger = LedgerClient::from_env()?;
        Ok(Self {
            config,
            http: reqwest::Client::new(),
            sora: Box::new(SoraClient::from_env()?),
            veo: Box::new(VeoClient::from_env()?),
            storage: R2Client::from_env().await?,
            jobs: JobRepository::new(ledger.clone()),
            credits: CreditsRepository::new(ledger),
            script: ScriptClient::from_env()?,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: WorkerConfig,
        http: reqwest::Client,
        sora: Box<dyn VideoProvider>,
        veo: Box<dyn VideoProvider>,
        storage: R2Client,
        jobs: JobRepository,
        credits: CreditsRepository,
        script: ScriptClient,
    ) -> Self {
        Self {
            config,
            http,
            sora,
            veo,
            storage,
            jobs,
            credits,
            script,
        }
    }

    /// Run one generation request end to end.
    pub async fn run_generation(&self, request: GenerationRequest) -> WorkerResult<JobResult> {
        request
            .validate()
            .map_err(|e| WorkerError::invalid_request(e.to_string()))?;

        let clip_unit = self.effective_clip_unit(&request)?;
        let required_credits = clip_count(request.total_duration_secs, clip_unit) as u32;

        // balance check happens before any record exists, so refused
        // requests leave no trace in the job table
        let balance = self.credits.ensure_user(&request.user_id).await?;
        if balance < required_credits {
            return Err(WorkerError::InsufficientCredits {
                available: balance,
                required: required_credits,
            });
        }

        let record = JobRecord::new(request);
        let record = self.jobs.create(&record).await?;
        let logger = JobLogger::new(&record.id, "generation");
        logger.log_start(&format!(
            "{}s requested, {} clips",
            record.request.total_duration_secs, required_credits
        ));

        let outcome = self
            .execute(&record, &logger)
            .instrument(logger.create_span())
            .await;
        match outcome {
            Ok(output_url) => {
                let credits_used = self.debit_after_success(&record, required_credits).await;
                self.jobs
                    .mark_completed(&record.id, &output_url, credits_used)
                    .await?;
                counter!("vgen_jobs_completed_total").increment(1);
                counter!("vgen_clips_generated_total").increment(required_credits as u64);
                logger.log_completion(&output_url);
                Ok(JobResult::completed(output_url, credits_used))
            }
            Err(e) => {
                let message = e.to_string();
                logger.log_error(&message);
                // the failure write must never mask the original error
                if let Err(write_err) = self.jobs.mark_failed(&record.id, &message).await {
                    logger.log_error(&format!("failed-status write also failed: {}", write_err));
                }
                counter!("vgen_jobs_failed_total").increment(1);
                Ok(JobResult::failed(message))
            }
        }
    }

    async fn execute(&self, record: &JobRecord, logger: &JobLogger) -> WorkerResult<String> {
        let request = &record.request;
        self.jobs.mark_generating(&record.id).await?;

        let provider = self.select_provider(request)?;
        let clip_unit = provider.round_duration(self.config.clip_unit_secs);
        let count = clip_count(request.total_duration_secs, clip_unit);
        let sequential = request.continuity == ContinuityMode::Sequential;

        let prompts = self
            .script
            .clip_prompts(&request.prompt, count, sequential)
            .await;
        let specs = decompose(request, clip_unit, &prompts)?;

        logger.log_progress(&format!(
            "dispatching {} clips to {}",
            specs.len(),
            provider.kind()
        ));

        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let job_dir = tempfile::Builder::new()
            .prefix(record.id.as_str())
            .tempdir_in(&self.config.work_dir)?;

        let poll_config = PollConfig {
            interval: self.config.poll_interval,
            max_wait: self.config.poll_max_wait,
        };
        let ctx = DispatchContext {
            provider,
            http: &self.http,
            poll_config: &poll_config,
            work_dir: job_dir.path(),
        };

        let clips = if sequential {
            ctx.dispatch_sequential(&specs).await?
        } else {
            ctx.dispatch_parallel(&specs).await?
        };

        logger.log_progress("all clips generated, stitching");
        let output_path = job_dir.path().join("final.mp4");
        let size = self.stitch_clips(&clips, &output_path, sequential).await?;

        let bytes = read_verified(&output_path, size).await?;
        let key = output_key(&request.user_id, &record.id);
        let url = self.storage.upload_bytes(bytes, &key, "video/mp4").await?;
        logger.log_progress(&format!("output stored at {}", url));

        self.upload_thumbnail(record, &output_path, logger).await;

        Ok(url)
    }

    /// Pick the backend for this request.
    ///
    /// Sequential continuity needs an image-seeded backend, so it always
    /// routes to Veo; a fixed Sora choice combined with sequential mode
    /// or reference images is a caller error rather than a silent switch.
    fn select_provider(&self, request: &GenerationRequest) -> WorkerResult<&dyn VideoProvider> {
        let sequential = request.continuity == ContinuityMode::Sequential;
        let has_references = !request.reference_images.is_empty();

        let kind = match request.provider {
            ProviderPolicy::Fixed(kind) => {
                if kind == ProviderKind::Sora && (sequential || has_references) {
                    return Err(WorkerError::invalid_request(
                        "the sora backend accepts neither reference images nor sequential continuity",
                    ));
                }
                kind
            }
            ProviderPolicy::Auto if sequential || has_references => ProviderKind::Veo,
            ProviderPolicy::Auto => ProviderKind::Sora,
        };

        Ok(match kind {
            ProviderKind::Sora => self.sora.as_ref(),
            ProviderKind::Veo => self.veo.as_ref(),
        })
    }

    /// Clip unit after the selected backend's duration rounding.
    ///
    /// A backend with a smaller native duration set shrinks the unit, so
    /// clip counts computed against this value keep the dispatched total
    /// at or above the requested duration.
    fn effective_clip_unit(&self, request: &GenerationRequest) -> WorkerResult<u32> {
        let provider = self.select_provider(request)?;
        Ok(provider.round_duration(self.config.clip_unit_secs))
    }

    async fn stitch_clips(
        &self,
        clips: &[ClipResult],
        output: &Path,
        sequential: bool,
    ) -> WorkerResult<u64> {
        // sequential clips share boundary frames, so a hard cut is
        // already smooth; independent clips get a crossfade to mask the
        // discontinuity
        let transition = if sequential || clips.len() == 1 {
            TransitionMode::Cut
        } else {
            TransitionMode::Crossfade {
                duration_secs: self.config.crossfade_secs,
            }
        };

        let paths = clips.iter().map(|c| c.path.clone()).collect();
        let plan = StitchPlan::new(paths, transition, output)?;
        Ok(stitch(&plan).await?)
    }

    /// Credits are debited only after the output is durably stored. A
    /// debit failure at this point is logged and reported as zero rather
    /// than failing a job whose output already exists.
    async fn debit_after_success(&self, record: &JobRecord, amount: u32) -> u32 {
        match self.credits.debit(&record.user_id, amount).await {
            Ok(remaining) => {
                info!(
                    job_id = %record.id,
                    amount,
                    remaining,
                    "Credits debited"
                );
                amount
            }
            Err(e) => {
                warn!(
                    job_id = %record.id,
                    error = %e,
                    "Credit debit failed after successful upload"
                );
                0
            }
        }
    }

    /// Best-effort thumbnail from the first frame of the output.
    async fn upload_thumbnail(&self, record: &JobRecord, output: &Path, logger: &JobLogger) {
        let thumb_path = output.with_extension("thumb.jpg");
        let result = async {
            extract_frame(
                output,
                &thumb_path,
                &FrameExtractOptions { position: 0.0 },
            )
            .await?;
            let bytes = tokio::fs::read(&thumb_path).await?;
            let key = thumbnail_key(&record.user_id, &record.id);
            self.storage
                .upload_bytes(bytes, &key, "image/jpeg")
                .await?;
            Ok::<_, WorkerError>(())
        }
        .await;

        if let Err(e) = result {
            logger.log_warning(&format!("thumbnail upload skipped: {}", e));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vgen_ledger::LedgerConfig;
    use vgen_models::{
        ClipSpec, GenerationRequest, JobStatus, ResultLocator, TaskHandle, TaskStatus,
    };
    use vgen_providers::{ProviderError, ProviderResult, RetryPolicy};
    use vgen_storage::R2Config;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

    async fn fixture() -> Orchestrator {
        let ledger = LedgerClient::new(LedgerConfig {
            base_url: "http://ledger.test".to_string(),
            service_key: "k".to_string(),
        })
        .unwrap();
        let storage = R2Client::new(R2Config {
            endpoint_url: "http://r2.test".to_string(),
            access_key_id: "id".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "bucket".to_string(),
            region: "auto".to_string(),
            public_base_url: "http://cdn.test".to_string(),
        })
        .await
        .unwrap();

        Orchestrator::new(
            WorkerConfig::default(),
            reqwest::Client::new(),
            Box::new(SoraClient::new("k")),
            Box::new(VeoClient::new("k")),
            storage,
            JobRepository::new(ledger.clone()),
            CreditsRepository::new(ledger),
            ScriptClient::new("k"),
        )
    }

    #[tokio::test]
    async fn test_auto_routing() {
        let orch = fixture().await;
        let mut req = GenerationRequest::new("u", "a red fox", 20);
        assert_eq!(orch.select_provider(&req).unwrap().kind(), ProviderKind::Sora);

        req.reference_images = vec!["https://img.example/a.jpg".into()];
        assert_eq!(orch.select_provider(&req).unwrap().kind(), ProviderKind::Veo);

        req.reference_images.clear();
        req.continuity = ContinuityMode::Sequential;
        assert_eq!(orch.select_provider(&req).unwrap().kind(), ProviderKind::Veo);
    }

    #[tokio::test]
    async fn test_fixed_sora_with_references_rejected() {
        let orch = fixture().await;
        let mut req = GenerationRequest::new("u", "a red fox", 20);
        req.provider = ProviderPolicy::Fixed(ProviderKind::Sora);
        req.reference_images = vec!["https://img.example/a.jpg".into()];
        let err = match orch.select_provider(&req) {
            Ok(_) => panic!("fixed sora with references must be rejected"),
            Err(e) => e,
        };
        assert!(matches!(err, WorkerError::InvalidRequest(_)));

        req.reference_images.clear();
        req.provider = ProviderPolicy::Fixed(ProviderKind::Veo);
        assert_eq!(orch.select_provider(&req).unwrap().kind(), ProviderKind::Veo);
    }

    #[tokio::test]
    async fn test_effective_clip_unit_follows_provider() {
        let orch = fixture().await;
        let mut req = GenerationRequest::new("u", "a red fox", 25);
        // text-only routes to the 10-60s backend, the configured unit holds
        assert_eq!(orch.effective_clip_unit(&req).unwrap(), 10);

        // sequential routes to the {4,6,8} backend: the unit shrinks and
        // the clip count grows so coverage still meets the request
        req.continuity = ContinuityMode::Sequential;
        let unit = orch.effective_clip_unit(&req).unwrap();
        assert_eq!(unit, 8);
        let n = clip_count(25, unit) as u32;
        assert_eq!(n, 4);
        assert!(n * unit >= 25);
    }

    /// Provider that resolves every task immediately, optionally failing
    /// at submit time.
    struct ScriptedProvider {
        clip_url: String,
        fail_submit: bool,
    }

    #[async_trait::async_trait]
    impl VideoProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Sora
        }

        fn round_duration(&self, requested_secs: u32) -> u32 {
            requested_secs
        }

        async fn submit(&self, spec: &ClipSpec) -> ProviderResult<TaskHandle> {
            if self.fail_submit {
                return Err(ProviderError::TaskFailed {
                    code: "E9".into(),
                    message: "content policy".into(),
                });
            }
            Ok(TaskHandle::new(ProviderKind::Sora, format!("t-{}", spec.index)))
        }

        async fn poll(&self, _handle: &TaskHandle) -> ProviderResult<TaskStatus> {
            Ok(TaskStatus::Succeeded {
                result: ResultLocator::Url(self.clip_url.clone()),
            })
        }
    }

    /// PostgREST-style insert responder: echoes the inserted row back as
    /// a one-element representation array.
    struct EchoRow;

    impl Respond for EchoRow {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let row: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            ResponseTemplate::new(201).set_body_json(serde_json::json!([row]))
        }
    }

    async fn lifecycle_fixture(
        ledger_uri: &str,
        storage_uri: &str,
        provider: ScriptedProvider,
        work_dir: &std::path::Path,
    ) -> Orchestrator {
        let ledger = LedgerClient::new(LedgerConfig {
            base_url: ledger_uri.to_string(),
            service_key: "k".to_string(),
        })
        .unwrap();
        let storage = R2Client::new(R2Config {
            endpoint_url: storage_uri.to_string(),
            access_key_id: "id".to_string(),
            secret_access_key: "secret".to_string(),
            bucket_name: "bucket".to_string(),
            region: "auto".to_string(),
            public_base_url: "http://cdn.test".to_string(),
        })
        .await
        .unwrap();

        let config = WorkerConfig {
            poll_interval: Duration::from_millis(5),
            poll_max_wait: Duration::from_millis(500),
            work_dir: work_dir.to_string_lossy().to_string(),
            ..WorkerConfig::default()
        };

        // no script mock is mounted, so enrichment 404s and the local
        // template fallback supplies the prompts
        let script = ScriptClient::new("k")
            .with_base_url(ledger_uri)
            .with_retry_policy(
                RetryPolicy::new("script generation")
                    .with_max_attempts(1)
                    .with_initial_delay(Duration::from_millis(1)),
            );

        Orchestrator::new(
            config,
            reqwest::Client::new(),
            Box::new(provider),
            Box::new(VeoClient::new("k")),
            storage,
            JobRepository::new(ledger.clone()),
            CreditsRepository::new(ledger),
            script,
        )
    }

    #[tokio::test]
    async fn test_run_generation_debits_after_durable_upload() {
        let ledger = MockServer::start().await;
        let storage = MockServer::start().await;
        let clips = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!([{"id": "user-1", "credits": 5}]),
            ))
            .mount(&ledger)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/video_jobs"))
            .respond_with(EchoRow)
            .expect(1)
            .mount(&ledger)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/video_jobs"))
            .and(body_partial_json(serde_json::json!({"status": "generating"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&ledger)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/video_jobs"))
            .and(body_partial_json(serde_json::json!({
                "status": "completed",
                "credits_used": 1,
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&ledger)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/decrement_credits"))
            .and(body_partial_json(serde_json::json!({
                "p_user_id": "user-1",
                "p_amount": 1,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"success": true, "balance": 4}),
            ))
            .expect(1)
            .mount(&ledger)
            .await;

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&storage)
            .await;
        Mock::given(method("GET"))
            .and(path("/clip.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&clips)
            .await;

        let work = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider {
            clip_url: format!("{}/clip.mp4", clips.uri()),
            fail_submit: false,
        };
        let orch = lifecycle_fixture(&ledger.uri(), &storage.uri(), provider, work.path()).await;

        let result = orch
            .run_generation(GenerationRequest::new("user-1", "a red fox", 10))
            .await
            .unwrap();
        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.credits_used, 1);
        let url = result.output_url.unwrap();
        assert!(url.starts_with("http://cdn.test/videos/user-1/"), "{}", url);
        assert!(url.ends_with("/final.mp4"), "{}", url);
    }

    #[tokio::test]
    async fn test_failed_batch_marks_failed_and_debits_nothing() {
        let ledger = MockServer::start().await;
        let storage = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!([{"id": "user-1", "credits": 5}]),
            ))
            .mount(&ledger)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/video_jobs"))
            .respond_with(EchoRow)
            .expect(1)
            .mount(&ledger)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/video_jobs"))
            .and(body_partial_json(serde_json::json!({"status": "generating"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&ledger)
            .await;
        // the backend failure lands verbatim in the failed-status write
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/video_jobs"))
            .and(body_partial_json(serde_json::json!({
                "status": "failed",
                "error": "Provider error: Task failed (E9): content policy",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&ledger)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/decrement_credits"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"success": true, "balance": 5}),
            ))
            .expect(0)
            .mount(&ledger)
            .await;

        let work = tempfile::tempdir().unwrap();
        let provider = ScriptedProvider {
            clip_url: String::new(),
            fail_submit: true,
        };
        let orch = lifecycle_fixture(&ledger.uri(), &storage.uri(), provider, work.path()).await;

        let result = orch
            .run_generation(GenerationRequest::new("user-1", "a red fox", 20))
            .await
            .unwrap();
        assert_eq!(result.status, JobStatus::Failed);
        assert_eq!(result.credits_used, 0);
        assert!(result.error.unwrap().contains("content policy"));
    }
}
