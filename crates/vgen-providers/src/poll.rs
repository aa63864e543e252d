//! Terminal-state polling loop over a provider task.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use vgen_models::{ResultLocator, TaskHandle, TaskStatus};

use crate::adapter::VideoProvider;
use crate::error::{ProviderError, ProviderResult};
use crate::retry::{call_with_retry, RetryPolicy};

/// Pacing for one polling session.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed pause between status checks.
    pub interval: Duration,
    /// Wall-clock budget for the whole session.
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_wait: Duration::from_secs(600),
        }
    }
}

/// Poll `handle` until the task reaches a terminal state.
///
/// Each status check goes through the retry executor, so a transient poll
/// failure does not kill a generation that is still running. A task that
/// outlives `max_wait` raises [`ProviderError::Timeout`]; a backend-reported
/// failure raises [`ProviderError::TaskFailed`] with the backend's code and
/// message untouched.
pub async fn poll_until_complete(
    provider: &dyn VideoProvider,
    handle: &TaskHandle,
    config: &PollConfig,
) -> ProviderResult<ResultLocator> {
    let deadline = Instant::now() + config.max_wait;
    let policy = RetryPolicy::new(format!("poll {}", handle.task_id));

    loop {
        let status = call_with_retry(&policy, ProviderError::is_retryable, || {
            provider.poll(handle)
        })
        .await?;

        match status {
            TaskStatus::Queued => {
                debug!("Task {} still queued", handle.task_id);
            }
            TaskStatus::InProgress { progress } => match progress {
                Some(p) => debug!("Task {} in progress ({}%)", handle.task_id, p),
                None => debug!("Task {} in progress", handle.task_id),
            },
            TaskStatus::Succeeded { result } => {
                info!("Task {} completed", handle.task_id);
                return Ok(result);
            }
            TaskStatus::Failed { code, message } => {
                warn!("Task {} failed ({}): {}", handle.task_id, code, message);
                return Err(ProviderError::TaskFailed { code, message });
            }
        }

        if Instant::now() + config.interval > deadline {
            warn!(
                "Task {} did not finish within {:?}",
                handle.task_id, config.max_wait
            );
            return Err(ProviderError::Timeout(config.max_wait.as_secs()));
        }
        tokio::time::sleep(config.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use vgen_models::{ClipSpec, ProviderKind};

    /// Scripted provider: yields each status in turn, then repeats the last.
    struct Scripted {
        statuses: Vec<ProviderResult<TaskStatus>>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(statuses: Vec<ProviderResult<TaskStatus>>) -> Self {
            Self {
                statuses,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl VideoProvider for Scripted {
        fn kind(&self) -> ProviderKind {
            ProviderKind::Sora
        }

        fn round_duration(&self, requested_secs: u32) -> u32 {
            requested_secs
        }

        async fn submit(&self, _spec: &ClipSpec) -> ProviderResult<TaskHandle> {
            Ok(TaskHandle::new(ProviderKind::Sora, "scripted"))
        }

        async fn poll(&self, _handle: &TaskHandle) -> ProviderResult<TaskStatus> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let idx = n.min(self.statuses.len() - 1);
            match &self.statuses[idx] {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(ProviderError::Api(e.to_string())),
            }
        }
    }

    fn fast_config() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_polls_through_to_success() {
        let provider = Scripted::new(vec![
            Ok(TaskStatus::Queued),
            Ok(TaskStatus::InProgress { progress: Some(40) }),
            Ok(TaskStatus::Succeeded {
                result: ResultLocator::Url("https://cdn.example/v.mp4".into()),
            }),
        ]);
        let handle = TaskHandle::new(ProviderKind::Sora, "t");

        let result = poll_until_complete(&provider, &handle, &fast_config())
            .await
            .unwrap();
        assert_eq!(result.as_url(), "https://cdn.example/v.mp4");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backend_failure_is_terminal() {
        let provider = Scripted::new(vec![Ok(TaskStatus::Failed {
            code: "E9".into(),
            message: "content policy".into(),
        })]);
        let handle = TaskHandle::new(ProviderKind::Sora, "t");

        let err = poll_until_complete(&provider, &handle, &fast_config())
            .await
            .unwrap_err();
        match err {
            ProviderError::TaskFailed { code, message } => {
                assert_eq!(code, "E9");
                assert_eq!(message, "content policy");
            }
            other => panic!("expected TaskFailed, got {:?}", other),
        }
        // no further polls after a terminal state
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_never_finishing_task_times_out() {
        let provider = Scripted::new(vec![Ok(TaskStatus::InProgress { progress: None })]);
        let handle = TaskHandle::new(ProviderKind::Sora, "t");

        let err = poll_until_complete(&provider, &handle, &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_transient_poll_errors_do_not_kill_session() {
        let provider = Scripted::new(vec![
            Err(ProviderError::Api("503 unavailable".into())),
            Ok(TaskStatus::Succeeded {
                result: ResultLocator::Url("https://cdn.example/v.mp4".into()),
            }),
        ]);
        let handle = TaskHandle::new(ProviderKind::Sora, "t");

        let result = poll_until_complete(&provider, &handle, &fast_config())
            .await
            .unwrap();
        assert_eq!(result.as_url(), "https://cdn.example/v.mp4");
    }
}
