//! Uniform provider abstraction.

use async_trait::async_trait;
use tracing::warn;

use vgen_models::{ClipSpec, ProviderKind, TaskHandle, TaskStatus};

use crate::error::{ProviderError, ProviderResult};

/// Uniform submit/poll contract over heterogeneous generation backends.
///
/// `submit` validates the spec against the backend's capability model and
/// returns an opaque handle; `poll` is a single non-blocking status check
/// and never sleeps. Adapters keep no state beyond what reconstructs the
/// handle.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Which backend this adapter fronts.
    fn kind(&self) -> ProviderKind;

    /// Map a requested duration onto one the backend accepts.
    ///
    /// Out-of-set values are rounded, never rejected.
    fn round_duration(&self, requested_secs: u32) -> u32;

    /// Validate and submit a clip spec; returns the provider task handle.
    async fn submit(&self, spec: &ClipSpec) -> ProviderResult<TaskHandle>;

    /// Single status check for a previously submitted task.
    async fn poll(&self, handle: &TaskHandle) -> ProviderResult<TaskStatus>;
}

/// Round to the nearest member of a discrete supported set.
///
/// Logs when rounding changes the requested value, since callers may be
/// surprised by the substitution.
pub fn nearest_supported(supported: &[u32], requested_secs: u32) -> u32 {
    debug_assert!(!supported.is_empty());

    let nearest = supported
        .iter()
        .copied()
        .min_by_key(|s| s.abs_diff(requested_secs))
        .unwrap_or(requested_secs);

    if nearest != requested_secs {
        warn!(
            "Requested clip duration {}s not supported, rounding to {}s",
            requested_secs, nearest
        );
    }
    nearest
}

/// Reject handles issued by a different provider.
pub fn ensure_handle_owner(handle: &TaskHandle, kind: ProviderKind) -> ProviderResult<()> {
    if handle.provider != kind {
        return Err(ProviderError::InvalidSpec(format!(
            "task handle {} belongs to provider {}, not {}",
            handle.task_id, handle.provider, kind
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_supported_rounds_to_closest() {
        let set = [4, 6, 8];
        assert_eq!(nearest_supported(&set, 4), 4);
        assert_eq!(nearest_supported(&set, 5), 4); // ties break low
        assert_eq!(nearest_supported(&set, 7), 6);
        assert_eq!(nearest_supported(&set, 10), 8);
        assert_eq!(nearest_supported(&set, 1), 4);
    }

    #[test]
    fn test_handle_ownership() {
        let handle = TaskHandle::new(ProviderKind::Sora, "t1");
        assert!(ensure_handle_owner(&handle, ProviderKind::Sora).is_ok());
        let err = ensure_handle_owner(&handle, ProviderKind::Veo).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidSpec(_)));
    }
}
