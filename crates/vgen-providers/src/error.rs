//! Provider error taxonomy.

use thiserror::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors raised by provider adapters and the polling machinery.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Backend signalled rate limiting or quota exhaustion; retryable
    /// with a longer backoff.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transient transport failure (5xx, connection reset, timeout);
    /// retryable.
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// The clip spec violates the backend's capability model. A caller
    /// defect; never retried.
    #[error("Invalid spec: {0}")]
    InvalidSpec(String),

    /// The backend reported the generation task itself failed. The code
    /// and message are surfaced verbatim.
    #[error("Task failed ({code}): {message}")]
    TaskFailed { code: String, message: String },

    /// Synthetic timeout raised by the polling loop, distinct from a
    /// backend-reported failure.
    #[error("Task did not complete within {0} seconds")]
    Timeout(u64),

    /// Non-transient backend API error (bad request, auth, unexpected
    /// response shape).
    #[error("Provider API error: {0}")]
    Api(String),

    #[error("Response parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    /// Whether the retry executor should attempt this call again.
    ///
    /// Rate-limit and transient variants always retry; API errors retry
    /// only when their text carries a transient signal. Spec violations
    /// and task outcomes never retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimited(_) | ProviderError::TransientNetwork(_) => true,
            ProviderError::Api(msg) => is_retryable_text(msg),
            _ => false,
        }
    }

    /// Classify a reqwest transport error.
    pub fn from_http(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            ProviderError::TransientNetwork(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_status(status, e.to_string())
        } else {
            ProviderError::TransientNetwork(e.to_string())
        }
    }

    /// Classify an HTTP status into the taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            ProviderError::RateLimited(body)
        } else if status.is_server_error() {
            ProviderError::TransientNetwork(format!("{}: {}", status, body))
        } else {
            ProviderError::Api(format!("{}: {}", status, body))
        }
    }
}

/// Textual retryability classification for errors whose kind alone is not
/// decisive (backend envelope messages, wrapped transport text).
pub fn is_retryable_text(msg: &str) -> bool {
    let msg = msg.to_lowercase();

    // rate limiting / quota signals
    if msg.contains("rate limit")
        || msg.contains("too many requests")
        || msg.contains("quota")
        || msg.contains("429")
    {
        return true;
    }

    // transient transport signals
    msg.contains("500")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
        || msg.contains("timed out")
        || msg.contains("timeout")
        || msg.contains("connection reset")
        || msg.contains("connection refused")
        || msg.contains("temporarily unavailable")
}
