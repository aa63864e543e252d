//! Bucket key layout.
//!
//! Everything a job produces lives under `videos/{user_id}/{job_id}/` so
//! per-user listing and cleanup stay prefix operations.

use vgen_models::JobId;

/// Key for a job's final stitched video.
pub fn output_key(user_id: &str, job_id: &JobId) -> String {
    format!("videos/{}/{}/final.mp4", sanitize(user_id), job_id)
}

/// Key for a job's thumbnail still.
pub fn thumbnail_key(user_id: &str, job_id: &JobId) -> String {
    format!("videos/{}/{}/thumb.jpg", sanitize(user_id), job_id)
}

/// Prefix covering everything a job uploaded.
pub fn job_prefix(user_id: &str, job_id: &JobId) -> String {
    format!("videos/{}/{}/", sanitize(user_id), job_id)
}

/// Strip path separators from caller-supplied identifiers so they cannot
/// escape their prefix.
fn sanitize(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_key_layout() {
        let job = JobId::from_string("j-123");
        assert_eq!(output_key("user-1", &job), "videos/user-1/j-123/final.mp4");
        assert_eq!(thumbnail_key("user-1", &job), "videos/user-1/j-123/thumb.jpg");
        assert!(output_key("user-1", &job).starts_with(&job_prefix("user-1", &job)));
    }

    #[test]
    fn test_separators_stripped_from_user_id() {
        let job = JobId::from_string("j-1");
        assert_eq!(output_key("../u", &job), "videos/u/j-1/final.mp4");
    }
}
