//! API client configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default backend base URL
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable overriding the base URL
pub const BASE_URL_ENV: &str = "CRM_API_BASE_URL";

/// Environment variable overriding the request timeout
pub const TIMEOUT_ENV: &str = "CRM_API_TIMEOUT_SECS";

/// Backend API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL the endpoint paths are joined to
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    /// Create config for `base_url` with default timeout
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overridden by `CRM_API_BASE_URL` / `CRM_API_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        if let Ok(secs) = env::var(TIMEOUT_ENV) {
            match secs.trim().parse() {
                Ok(secs) => config.timeout_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid {}={:?}", TIMEOUT_ENV, secs),
            }
        }
        config
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Join `path` onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
