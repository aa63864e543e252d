//! Veo-style image-conditioned adapter.
//!
//! Accepts up to three reference images (plain text-to-video when none
//! are given) and a discrete duration set. Responses arrive in a
//! `{code, msg, data}` envelope where `code == 200` means success
//! regardless of HTTP status, and the completed result is a JSON document
//! nested one level deep.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use vgen_models::{ClipSpec, ProviderKind, ResultLocator, SeedRole, TaskHandle, TaskStatus};

use crate::adapter::{ensure_handle_owner, nearest_supported, VideoProvider};
use crate::error::{is_retryable_text, ProviderError, ProviderResult};
use crate::images::seed_to_url;

const DEFAULT_BASE_URL: &str = "https://api.kie.ai/api/v1";

/// Durations the backend natively generates.
const SUPPORTED_DURATIONS: [u32; 3] = [4, 6, 8];

/// Backend-side prompt length ceiling.
const MAX_PROMPT_CHARS: usize = 5000;

/// Client for the Veo-style generation API.
pub struct VeoClient {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    image_urls: Vec<String>,
    generation_type: &'a str,
    duration: u32,
    aspect_ratio: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateData {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    result_json: Option<String>,
    #[serde(default)]
    fail_code: Option<String>,
    #[serde(default)]
    fail_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultDocument {
    #[serde(default)]
    result_urls: Vec<String>,
}

impl VeoClient {
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
        let api_key = std::env::var("VEO_API_KEY")
            .map_err(|_| ProviderError::Api("VEO_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    /// Resolve seed images to transmissible URLs, start frame first.
    ///
    /// No seed images means plain text-to-video. Ordering matters when
    /// they are present: the backend treats the first URL as the opening
    /// keyframe, so a keyframe request without a start seed is rejected
    /// rather than silently reordered.
    fn resolve_image_urls(spec: &ClipSpec) -> ProviderResult<Vec<String>> {
        if spec.seed_images.is_empty() {
            return Ok(Vec::new());
        }

        let mut ordered: Vec<_> = spec.seed_images.iter().collect();
        ordered.sort_by_key(|s| match s.role {
            SeedRole::Start => 0u8,
            SeedRole::Middle => 1,
            SeedRole::End => 2,
        });

        if spec.seed_images.len() == 1 && ordered[0].role != SeedRole::Start {
            return Err(ProviderError::InvalidSpec(
                "single-keyframe generation needs a start seed".to_string(),
            ));
        }

        ordered.iter().map(|s| seed_to_url(s)).collect()
    }

    fn generation_type(image_count: usize) -> &'static str {
        match image_count {
            0 => "TEXT_2_VIDEO",
            1 => "FIRST_AND_LAST_FRAMES_2_VIDEO",
            _ => "REFERENCE_2_VIDEO",
        }
    }

    /// Unwrap the `{code, msg, data}` envelope, mapping non-200 codes to
    /// the error taxonomy by message text.
    fn unwrap_envelope<T>(envelope: Envelope<T>) -> ProviderResult<T> {
        if envelope.code != 200 {
            let msg = envelope.msg.unwrap_or_else(|| "no message".to_string());
            let text = format!("backend code {}: {}", envelope.code, msg);
            return if is_retryable_text(&text) {
                Err(ProviderError::TransientNetwork(text))
            } else {
                Err(ProviderError::Api(text))
            };
        }
        envelope
            .data
            .ok_or_else(|| ProviderError::Api("envelope code 200 but data missing".to_string()))
    }
}

#[async_trait::async_trait]
impl VideoProvider for VeoClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Veo
    }

    fn round_duration(&self, requested_secs: u32) -> u32 {
        nearest_supported(&SUPPORTED_DURATIONS, requested_secs)
    }

    async fn submit(&self, spec: &ClipSpec) -> ProviderResult<TaskHandle> {
        if spec.prompt.trim().is_empty() {
            return Err(ProviderError::InvalidSpec("prompt is empty".to_string()));
        }

        let image_urls = Self::resolve_image_urls(spec)?;
        let prompt = truncate_chars(&spec.prompt, MAX_PROMPT_CHARS);

        let payload = GenerateRequest {
            model: "veo-3.1",
            prompt,
            generation_type: Self::generation_type(image_urls.len()),
            image_urls,
            duration: self.round_duration(spec.duration_secs),
            aspect_ratio: spec.aspect.as_ratio_str(),
        };

        debug!(
            "Submitting clip {} to veo backend ({} seed images, {})",
            spec.index,
            payload.image_urls.len(),
            payload.generation_type
        );

        let response = self
            .http
            .post(format!("{}/veo/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(ProviderError::from_http)?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::from_http)?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status, body));
        }

        let envelope: Envelope<GenerateData> = serde_json::from_str(&body)?;
        let data = Self::unwrap_envelope(envelope)?;

        info!("Veo task created: {}", data.task_id);
        Ok(TaskHandle::new(ProviderKind::Veo, data.task_id))
    }

    async fn poll(&self, handle: &TaskHandle) -> ProviderResult<TaskStatus> {
        ensure_handle_owner(handle, ProviderKind::Veo)?;

        let response = self
            .http
            .get(format!("{}/veo/query", self.base_url))
            .query(&[("taskId", handle.task_id.as_str())])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(ProviderError::from_http)?;

        let status = response.status();
        let body = response.text().await.map_err(ProviderError::from_http)?;
        if !status.is_success() {
            return Err(ProviderError::from_status(status, body));
        }

        let envelope: Envelope<QueryData> = serde_json::from_str(&body)?;
        let data = Self::unwrap_envelope(envelope)?;

        match data.state.as_deref() {
            Some("wait") | Some("queuing") => Ok(TaskStatus::Queued),
            Some("generating") => Ok(TaskStatus::InProgress { progress: None }),
            Some("success") => {
                let raw = data.result_json.ok_or_else(|| {
                    ProviderError::Api("successful task carries no result document".to_string())
                })?;
                // resultJson is a JSON document serialized into a string
                // field, parsed exactly one level deep.
                let doc: ResultDocument = serde_json::from_str(&raw)?;
                let url = doc.result_urls.into_iter().next().ok_or_else(|| {
                    ProviderError::Api("result document has no URLs".to_string())
                })?;
                Ok(TaskStatus::Succeeded {
                    result: ResultLocator::Url(url),
                })
            }
            Some("fail") => Ok(TaskStatus::Failed {
                code: data.fail_code.unwrap_or_else(|| "unknown".to_string()),
                message: data.fail_msg.unwrap_or_else(|| "generation failed".to_string()),
            }),
            other => Err(ProviderError::Api(format!(
                "unknown task state '{}' for {}",
                other.unwrap_or("<none>"),
                handle.task_id
            ))),
        }
    }
}

/// Truncate on a char boundary without allocating when under the limit.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
