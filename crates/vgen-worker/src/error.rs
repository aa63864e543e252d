//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Insufficient credits: have {available}, need {required}")]
    InsufficientCredits { available: u32, required: u32 },

    #[error("Script generation failed: {0}")]
    ScriptFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Provider error: {0}")]
    Provider(#[from] vgen_providers::ProviderError),

    #[error("Media error: {0}")]
    Media(#[from] vgen_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] vgen_storage::StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] vgen_ledger::LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn script_failed(msg: impl Into<String>) -> Self {
        Self::ScriptFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether a retry could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Provider(e) => e.is_retryable(),
            WorkerError::Ledger(e) => e.is_retryable(),
            WorkerError::ScriptFailed(_) => true,
            WorkerError::Storage(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_providers::ProviderError;

    #[test]
    fn test_retryability_follows_source() {
        let e = WorkerError::from(ProviderError::RateLimited("slow".into()));
        assert!(e.is_retryable());

        let e = WorkerError::from(ProviderError::InvalidSpec("no seed".into()));
        assert!(!e.is_retryable());

        assert!(!WorkerError::invalid_request("duration 0").is_retryable());
        assert!(!WorkerError::InsufficientCredits {
            available: 1,
            required: 3
        }
        .is_retryable());
    }

    #[test]
    fn test_provider_failure_text_flows_through() {
        let e = WorkerError::from(ProviderError::TaskFailed {
            code: "E9".into(),
            message: "content policy".into(),
        });
        assert_eq!(e.to_string(), "Provider error: Task failed (E9): content policy");
    }
}
