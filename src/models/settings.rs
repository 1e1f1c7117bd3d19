use serde::{Deserialize, Serialize};

pub const DEFAULT_UPSTREAM_TIMEOUT_MS: u64 = 15_000;

/// Process-wide settings, re-read on every proxy call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,
}

fn default_upstream_timeout_ms() -> u64 {
    DEFAULT_UPSTREAM_TIMEOUT_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            upstream_timeout_ms: default_upstream_timeout_ms(),
        }
    }
}
