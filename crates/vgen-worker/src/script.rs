//! Per-clip prompt enrichment.
//!
//! A text model expands the user's prompt into one scene description per
//! clip. Enrichment is best-effort: when the model call ultimately fails,
//! a local template fallback produces the per-clip prompts instead, so a
//! job never dies here.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vgen_providers::{call_with_retry, is_retryable_text, RetryPolicy};

use crate::error::{WorkerError, WorkerResult};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const MODEL: &str = "gemini-2.0-flash";

/// Text model client for scene scripting.
pub struct ScriptClient {
    api_key: String,
    client: Client,
    base_url: String,
    retry_policy: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ScriptRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ScenesDocument {
    scenes: Vec<String>,
}

impl ScriptClient {
    pub fn from_env() -> WorkerResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| WorkerError::config_error("GEMINI_API_KEY not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            retry_policy: RetryPolicy::critical("script generation"),
        }
    }

    /// Override the API endpoint (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// Expand `prompt` into `clip_count` scene prompts.
    ///
    /// Falls back to local templates when the model call fails after
    /// retries; the returned vector always has exactly `clip_count`
    /// entries.
    pub async fn clip_prompts(
        &self,
        prompt: &str,
        clip_count: usize,
        sequential: bool,
    ) -> Vec<String> {
        let result = call_with_retry(
            &self.retry_policy,
            |e: &WorkerError| e.is_retryable(),
            || self.request_scenes(prompt, clip_count, sequential),
        )
        .await;

        match result {
            Ok(scenes) => scenes,
            Err(e) => {
                warn!("Script generation failed, using template fallback: {}", e);
                fallback_prompts(prompt, clip_count, sequential)
            }
        }
    }

    async fn request_scenes(
        &self,
        prompt: &str,
        clip_count: usize,
        sequential: bool,
    ) -> WorkerResult<Vec<String>> {
        let continuity_clause = if sequential {
            "The scenes play back-to-back as one continuous shot, so each \
             scene must begin exactly where the previous one ends."
        } else {
            "The scenes are cut together, so each can stand alone while \
             keeping a consistent subject and visual style."
        };

        let instruction = format!(
            "Expand the following short-form video concept into exactly {} \
             scene descriptions for a video generation model. {} Respond as \
             JSON: {{\"scenes\": [\"...\"]}}.\n\nConcept: {}",
            clip_count, continuity_clause, prompt
        );

        debug!("Requesting {} scene prompts", clip_count);

        let request = ScriptRequest {
            contents: vec![Content {
                parts: vec![Part { text: instruction }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, MODEL, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::script_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let text = format!("{}: {}", status, body);
            return if is_retryable_text(&text) || status.is_server_error() {
                Err(WorkerError::script_failed(text))
            } else {
                // non-transient model rejection, let the fallback take over
                Err(WorkerError::ConfigError(text))
            };
        }

        let parsed: ScriptResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::script_failed(format!("malformed response: {}", e)))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| WorkerError::script_failed("response carries no candidates"))?;

        let doc: ScenesDocument = serde_json::from_str(text)
            .map_err(|e| WorkerError::script_failed(format!("scene document: {}", e)))?;

        if doc.scenes.len() != clip_count {
            return Err(WorkerError::script_failed(format!(
                "asked for {} scenes, got {}",
                clip_count,
                doc.scenes.len()
            )));
        }

        info!("Script generation produced {} scenes", doc.scenes.len());
        Ok(doc.scenes)
    }
}

/// Local template fallback, keyed on common verticals.
pub fn fallback_prompts(prompt: &str, clip_count: usize, sequential: bool) -> Vec<String> {
    let arc = niche_arc(prompt);

    (0..clip_count)
        .map(|i| {
            let beat = arc[i.min(arc.len() - 1)];
            let continuity = if sequential && i > 0 {
                " Continue seamlessly from the previous scene."
            } else {
                ""
            };
            format!(
                "{}. Scene {} of {}: {}.{}",
                prompt,
                i + 1,
                clip_count,
                beat,
                continuity
            )
        })
        .collect()
}

/// Pick a three-beat arc matching the prompt's vertical.
fn niche_arc(prompt: &str) -> &'static [&'static str] {
    let p = prompt.to_lowercase();

    if p.contains("recipe") || p.contains("cook") || p.contains("food") || p.contains("kitchen") {
        &[
            "close-up of fresh ingredients being prepared",
            "the dish coming together in the pan, steam rising",
            "the finished plate presented in warm light",
        ]
    } else if p.contains("travel") || p.contains("city") || p.contains("beach") || p.contains("trip")
    {
        &[
            "a sweeping establishing shot of the location",
            "street-level details and movement through the scene",
            "a golden-hour closing vista",
        ]
    } else if p.contains("workout") || p.contains("motivat") || p.contains("gym") {
        &[
            "a determined figure beginning the effort",
            "peak intensity, dynamic camera movement",
            "the triumphant finish, breathing hard",
        ]
    } else if p.contains("tech") || p.contains("gadget") || p.contains("app") || p.contains("device")
    {
        &[
            "a sleek product reveal on a clean surface",
            "the device in use, interface details in focus",
            "a stylized closing shot with soft reflections",
        ]
    } else {
        &[
            "an establishing shot introducing the subject",
            "the action developing with closer framing",
            "a memorable closing image",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_fallback_count_and_continuity() {
        let prompts = fallback_prompts("a cooking recipe for pasta", 4, true);
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].contains("ingredients"));
        assert!(!prompts[0].contains("Continue seamlessly"));
        assert!(prompts[1].contains("Continue seamlessly"));
    }

    #[test]
    fn test_fallback_generic_arc() {
        let prompts = fallback_prompts("abstract shapes morphing", 2, false);
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("establishing shot"));
    }

    #[tokio::test]
    async fn test_model_scenes_parsed() {
        let server = MockServer::start().await;
        let scenes = serde_json::json!({
            "scenes": ["scene one", "scene two"]
        })
        .to_string();
        Mock::given(method("POST"))
            .and(path_regex(r"^/models/.*:generateContent$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": scenes}]}}]
            })))
            .mount(&server)
            .await;

        let client = ScriptClient::new("key").with_base_url(server.uri());
        let prompts = client.clip_prompts("a red fox", 2, false).await;
        assert_eq!(prompts, vec!["scene one", "scene two"]);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
            .mount(&server)
            .await;

        let client = ScriptClient::new("key").with_base_url(server.uri());
        let prompts = client.clip_prompts("a red fox", 3, false).await;
        assert_eq!(prompts.len(), 3);
        assert!(prompts[0].starts_with("a red fox"));
    }

    #[tokio::test]
    async fn test_wrong_scene_count_rejected() {
        let server = MockServer::start().await;
        let scenes = serde_json::json!({"scenes": ["only one"]}).to_string();
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": scenes}]}}]
            })))
            .mount(&server)
            .await;

        let client = ScriptClient::new("key")
            .with_base_url(server.uri())
            .with_retry_policy(
                RetryPolicy::new("script generation")
                    .with_max_attempts(2)
                    .with_initial_delay(std::time::Duration::from_millis(1)),
            );
        // count mismatch exhausts retries, then falls back locally
        let prompts = client.clip_prompts("a red fox", 3, false).await;
        assert_eq!(prompts.len(), 3);
    }
}
