//! Provider task handles and polling statuses.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of supported generation backends.
///
/// Dispatch over backends is a tagged enum rather than a plugin registry;
/// the variant set is small and stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Sora-style text-to-video backend (10-60s native durations)
    Sora,
    /// Veo-style keyframe/reference backend (discrete short durations)
    Veo,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Sora => "sora",
            ProviderKind::Veo => "veo",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque provider-assigned task identifier.
///
/// A handle is owned by the adapter that created it and is never valid
/// against a different provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TaskHandle {
    /// Provider that issued this handle
    pub provider: ProviderKind,
    /// Provider-assigned task ID
    pub task_id: String,
}

impl TaskHandle {
    pub fn new(provider: ProviderKind, task_id: impl Into<String>) -> Self {
        Self {
            provider,
            task_id: task_id.into(),
        }
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.task_id)
    }
}

/// Locator for a completed task's result payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResultLocator {
    /// Direct URL to the generated video
    Url(String),
}

impl ResultLocator {
    pub fn as_url(&self) -> &str {
        match self {
            ResultLocator::Url(u) => u,
        }
    }
}

/// Status of a submitted generation task.
///
/// `Succeeded` and `Failed` are terminal; everything else requires
/// continued polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted by the backend, not yet started
    Queued,
    /// Generation in progress
    InProgress {
        /// Backend-reported progress (0-100), when available
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<u8>,
    },
    /// Generation finished, result available
    Succeeded { result: ResultLocator },
    /// Backend reported a failure
    Failed { code: String, message: String },
}

impl TaskStatus {
    /// Whether this status ends the polling loop.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded { .. } | TaskStatus::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::InProgress { progress: Some(40) }.is_terminal());
        assert!(TaskStatus::Succeeded {
            result: ResultLocator::Url("https://cdn.example/v.mp4".into())
        }
        .is_terminal());
        assert!(TaskStatus::Failed {
            code: "500".into(),
            message: "boom".into()
        }
        .is_terminal());
    }

    #[test]
    fn test_handle_display() {
        let handle = TaskHandle::new(ProviderKind::Veo, "abc123");
        assert_eq!(handle.to_string(), "veo:abc123");
    }

    #[test]
    fn test_status_serde_tag() {
        let status = TaskStatus::InProgress { progress: None };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "in_progress");
    }
}
