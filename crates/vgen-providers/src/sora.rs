//! Sora-style text-to-video adapter.
//!
//! Pure prompt-driven backend: accepts any whole-second duration in its
//! native 10-60s window, no reference images, optional watermark removal
//! on paid tiers.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vgen_models::{ClipSpec, ProviderKind, QualityTier, ResultLocator, TaskHandle, TaskStatus};

use crate::adapter::{ensure_handle_owner, VideoProvider};
use crate::error::{ProviderError, ProviderResult};

const DEFAULT_BASE_URL: &str = "https://api.kie.ai/v1";

/// Native duration window in seconds.
const MIN_DURATION_SECS: u32 = 10;
const MAX_DURATION_SECS: u32 = 60;

/// Client for the Sora-style generation API.
pub struct SoraClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    duration: u32,
    aspect_ratio: &'a str,
    remove_watermark: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    status: String,
    #[serde(default)]
    progress: Option<u8>,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SoraClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Override the API endpoint (tests, regional gateways).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("SORA_API_KEY")
            .map_err(|_| ProviderError::Api("SORA_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    fn model_for(quality: QualityTier) -> &'static str {
        match quality {
            QualityTier::Basic => "sora-2",
            QualityTier::Pro720 => "sora-2-pro-720p",
            QualityTier::Pro1080 => "sora-2-pro-1080p",
        }
    }
}

#[async_trait::async_trait]
impl VideoProvider for SoraClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Sora
    }

    fn round_duration(&self, requested_secs: u32) -> u32 {
        let rounded = requested_secs.clamp(MIN_DURATION_SECS, MAX_DURATION_SECS);
        if rounded != requested_secs {
            tracing::warn!(
                "Requested clip duration {}s outside {}-{}s, clamping to {}s",
                requested_secs,
                MIN_DURATION_SECS,
                MAX_DURATION_SECS,
                rounded
            );
        }
        rounded
    }

    async fn submit(&self, spec: &ClipSpec) -> ProviderResult<TaskHandle> {
        if spec.prompt.trim().is_empty() {
            return Err(ProviderError::InvalidSpec("prompt is empty".to_string()));
        }
        if !spec.seed_images.is_empty() {
            return Err(ProviderError::InvalidSpec(
                "this backend does not accept reference images".to_string(),
            ));
        }

        let payload = GenerateRequest {
            model: Self::model_for(spec.quality),
            prompt: &spec.prompt,
            duration: self.round_duration(spec.duration_secs),
            aspect_ratio: spec.aspect.as_ratio_str(),
            remove_watermark: spec.quality.removes_watermark(),
        };

        debug!("Submitting clip {} to sora backend", spec.index);

        let response = self
            .http
            .post(format!("{}/video/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("malformed submit response: {}", e)))?;

        info!("Sora task created: {}", parsed.task_id);
        Ok(TaskHandle::new(ProviderKind::Sora, parsed.task_id))
    }

    async fn poll(&self, handle: &TaskHandle) -> ProviderResult<TaskStatus> {
        ensure_handle_owner(handle, ProviderKind::Sora)?;

        let response = self
            .http
            .get(format!("{}/tasks/{}", self.base_url, handle.task_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ProviderError::from_http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let parsed: TaskResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Api(format!("malformed poll response: {}", e)))?;

        match parsed.status.as_str() {
            "queued" | "pending" => Ok(TaskStatus::Queued),
            "in_progress" | "processing" => Ok(TaskStatus::InProgress {
                progress: parsed.progress,
            }),
            "completed" => {
                let url = parsed.video_url.ok_or_else(|| {
                    ProviderError::Api("completed task carries no video_url".to_string())
                })?;
                Ok(TaskStatus::Succeeded {
                    result: ResultLocator::Url(url),
                })
            }
            "failed" => Ok(TaskStatus::Failed {
                code: parsed.error_code.unwrap_or_else(|| "unknown".to_string()),
                message: parsed.error.unwrap_or_else(|| "generation failed".to_string()),
            }),
            other => Err(ProviderError::Api(format!(
                "unknown task status '{}' for {}",
                other, handle.task_id
            ))),
        }
    }
}
