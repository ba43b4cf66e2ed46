//! Remote API configuration.
//!
//! Loaded from environment variables with sensible defaults.

use std::time::Duration;

/// Default base URL of the account / verification API.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Connection settings shared by every HTTP client in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// Base URL; endpoint paths are resolved relative to it.
    pub base_url: String,
    /// Per-request timeout (default: 10s)
    pub timeout: Duration,
    /// Maximum retry attempts for transient errors (default: 3)
    pub max_retries: u32,
    /// Initial retry interval (default: 100ms)
    pub initial_interval: Duration,
    /// Maximum retry interval (default: 2s)
    pub max_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
        }
    }
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Optional: `FACEGATE_API_URL`, `FACEGATE_API_TIMEOUT_SECS`,
    /// `FACEGATE_API_MAX_RETRIES`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("FACEGATE_API_URL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.base_url);

        let timeout = std::env::var("FACEGATE_API_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        let max_retries = std::env::var("FACEGATE_API_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_retries);

        Self {
            base_url,
            timeout,
            max_retries,
            ..defaults
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Upper bound on the time spent retrying one call.
    pub fn retry_budget(&self) -> Duration {
        self.timeout * self.max_retries.max(1)
    }
}
