//! Job lifecycle repository.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use vgen_models::{JobId, JobRecord, JobStatus};

use crate::client::LedgerClient;
use crate::error::{LedgerError, LedgerResult};

const JOBS_TABLE: &str = "video_jobs";

/// Repository for job records.
#[derive(Clone)]
pub struct JobRepository {
    client: LedgerClient,
}

impl JobRepository {
    pub fn new(client: LedgerClient) -> Self {
        Self { client }
    }

    /// Persist a freshly created job record.
    pub async fn create(&self, record: &JobRecord) -> LedgerResult<JobRecord> {
        let stored = self.client.insert(JOBS_TABLE, record).await?;
        info!(job_id = %record.id, user_id = %record.user_id, "Created job record");
        Ok(stored)
    }

    /// Fetch a job by ID.
    pub async fn get(&self, job_id: &JobId) -> LedgerResult<JobRecord> {
        let mut rows: Vec<JobRecord> = self
            .client
            .select(JOBS_TABLE, "id", job_id.as_str())
            .await?;
        rows.pop()
            .ok_or_else(|| LedgerError::not_found(format!("job {}", job_id)))
    }

    /// Move a job into the generating state.
    pub async fn mark_generating(&self, job_id: &JobId) -> LedgerResult<()> {
        self.set_fields(
            job_id,
            json!({
                "status": JobStatus::Generating,
                "updated_at": Utc::now(),
            }),
        )
        .await
    }

    /// Record successful completion with the durable output URL and the
    /// credits that were debited for it.
    pub async fn mark_completed(
        &self,
        job_id: &JobId,
        output_url: &str,
        credits_used: u32,
    ) -> LedgerResult<()> {
        let now = Utc::now();
        self.set_fields(
            job_id,
            json!({
                "status": JobStatus::Completed,
                "output_url": output_url,
                "credits_used": credits_used,
                "updated_at": now,
                "completed_at": now,
            }),
        )
        .await?;
        info!(job_id = %job_id, credits_used, "Job completed");
        Ok(())
    }

    /// Record terminal failure. The error message is stored verbatim.
    pub async fn mark_failed(&self, job_id: &JobId, error: &str) -> LedgerResult<()> {
        let now = Utc::now();
        self.set_fields(
            job_id,
            json!({
                "status": JobStatus::Failed,
                "error": error,
                "updated_at": now,
                "completed_at": now,
            }),
        )
        .await?;
        info!(job_id = %job_id, error, "Job failed");
        Ok(())
    }

    async fn set_fields(&self, job_id: &JobId, patch: serde_json::Value) -> LedgerResult<()> {
        self.client
            .update(JOBS_TABLE, "id", job_id.as_str(), &patch)
            .await
    }
}
