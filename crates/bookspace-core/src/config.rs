//! Engine configuration surface.

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::util::normalize_text_option;

const DEFAULT_DEBOUNCE_MS: u64 = 2_000;
const DEFAULT_BATCH_SIZE: usize = 400;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_BACKOFF_CAP_MS: u64 = 10_000;

/// Tunable sync engine configuration.
///
/// `workspace_id` identifies the shared remote workspace; when it is
/// absent the engine runs in local-only mode and every remote operation
/// short-circuits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub workspace_id: Option<String>,
    /// Quiet period before a burst of local edits is pushed.
    pub debounce_ms: u64,
    /// Atomic-batch size limit of the remote store.
    pub batch_size: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workspace_id: None,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
        }
    }
}

impl SyncConfig {
    /// Config for a named workspace with default tuning.
    #[must_use]
    pub fn for_workspace(workspace_id: impl Into<String>) -> Self {
        Self {
            workspace_id: normalize_text_option(Some(workspace_id.into())),
            ..Self::default()
        }
    }

    /// Whether a remote workspace is configured at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.workspace_id.is_some()
    }

    /// The retry policy derived from this config.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay_ms: self.backoff_base_ms,
            max_delay_ms: self.backoff_cap_ms,
        }
    }
}
