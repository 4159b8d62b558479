use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable that overrides [`AnalyticsConfig::base_url`].
pub const BASE_URL_ENV: &str = "FINANCIAL_API_URL";

/// Settings for the external analytics service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Service root, e.g. `http://localhost:8000`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-attempt request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts for a query, the first one included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay unit; attempt `n` waits `n * retry_delay_ms` before the next one.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Rows per progress report when streaming a single-entity series.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause between progress reports.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".into()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2_000
}
fn default_chunk_size() -> usize {
    100
}
fn default_chunk_delay_ms() -> u64 {
    10
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            chunk_size: default_chunk_size(),
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}

impl AnalyticsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Attempts actually made; a zero setting still makes one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Applies [`BASE_URL_ENV`] when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        self
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
