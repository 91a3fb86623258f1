//! Plugin-wide configuration for the lambda runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration applied to every function unless the record overrides it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Default per-invocation wall-clock budget (milliseconds), used when
    /// a function record has no `timeout_ms` of its own.
    pub default_timeout_ms: u64,
    /// Memory ceiling for each script runtime, in bytes.
    pub max_memory_bytes: usize,
    /// How much of an incoming HTTP request body is exposed to scripts
    /// as `$request.body`, in bytes. Longer bodies are truncated.
    pub max_request_body_bytes: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            max_memory_bytes: 128 * 1024 * 1024,
            max_request_body_bytes: 64 * 1024,
        }
    }
}

impl PluginConfig {
    /// Default timeout as a [`Duration`].
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}
