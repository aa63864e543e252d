//! Job lifecycle records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::request::GenerationRequest;

/// Unique identifier for a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ledger-visible job status.
///
/// Progress is observable only through this field; there is no callback
/// channel to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet dispatched
    #[default]
    Pending,
    /// Clips are being generated and stitched
    Generating,
    /// Final output durably stored
    Completed,
    /// Terminal failure; error message recorded verbatim
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Generating => "generating",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A job record as stored in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub id: JobId,
    pub user_id: String,
    #[serde(default)]
    pub status: JobStatus,
    /// The request that created this job
    pub request: GenerationRequest,
    /// Public URL of the stitched output (set on completion)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    /// Error message (set on failure, surfaced verbatim)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Credits debited for this job (set on completion)
    #[serde(default)]
    pub credits_used: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(request: GenerationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            user_id: request.user_id.clone(),
            status: JobStatus::Pending,
            request,
            output_url: None,
            error: None,
            credits_used: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Outcome of `run_generation`, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobResult {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub credits_used: u32,
}

impl JobResult {
    pub fn completed(output_url: impl Into<String>, credits_used: u32) -> Self {
        Self {
            status: JobStatus::Completed,
            output_url: Some(output_url.into()),
            error: None,
            credits_used,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            output_url: None,
            error: Some(error.into()),
            credits_used: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_record_creation() {
        let req = GenerationRequest::new("user1", "a calm ocean at dawn", 20);
        let record = JobRecord::new(req);
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.user_id, "user1");
        assert_eq!(record.credits_used, 0);
        assert!(record.error.is_none());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Generating.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_result_constructors() {
        let ok = JobResult::completed("https://cdn.example/out.mp4", 3);
        assert_eq!(ok.status, JobStatus::Completed);
        assert_eq!(ok.credits_used, 3);

        let err = JobResult::failed("backend exploded");
        assert_eq!(err.status, JobStatus::Failed);
        assert_eq!(err.credits_used, 0);
        assert_eq!(err.error.as_deref(), Some("backend exploded"));
    }
}
