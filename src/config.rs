//! Client configuration

use crate::error::{FormError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default backend URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL (no trailing slash needed)
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Name of the same-origin cookie mirroring the anti-forgery token
    pub csrf_cookie_name: String,
    /// Header carrying the anti-forgery token on mutating requests
    pub csrf_header_name: String,
    /// Token-issuing endpoint, relative to `base_url`
    pub token_path: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// Logging level used when RUST_LOG is unset
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 30,
            csrf_cookie_name: "csrftoken".into(),
            csrf_header_name: "X-CSRFToken".into(),
            token_path: "/csrf-token/".into(),
            user_agent: format!("formgate/{}", env!("CARGO_PKG_VERSION")),
            log_level: "info".into(),
        }
    }
}

impl ClientConfig {
    /// Config pointing at `base_url`, everything else default
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Load from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to file
    pub fn save(&self, path: &str) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults with `FORMGATE_*` environment variables applied
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    /// Apply `FORMGATE_BASE_URL`, `FORMGATE_TIMEOUT_SECS` and `FORMGATE_LOG_LEVEL` on top of `self`
    pub fn overlay_env(self) -> Result<Self> {
        self.overlay_vars(|key| std::env::var(key).ok())
    }

    fn overlay_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup("FORMGATE_BASE_URL") {
            self.base_url = url;
        }
        if let Some(secs) = lookup("FORMGATE_TIMEOUT_SECS") {
            self.timeout_secs = secs
                .trim()
                .parse()
                .map_err(|_| FormError::Config(format!("invalid FORMGATE_TIMEOUT_SECS: {secs}")))?;
        }
        if let Some(level) = lookup("FORMGATE_LOG_LEVEL") {
            self.log_level = level;
        }
        self.validate()?;
        Ok(self)
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check the values that would otherwise fail deep inside a request
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.base_url)?;
        if self.timeout_secs == 0 {
            return Err(FormError::Config("timeout_secs must be positive".into()));
        }
        if self.csrf_header_name.trim().is_empty() {
            return Err(FormError::Config("csrf_header_name must not be empty".into()));
        }
        if !self.token_path.starts_with('/') {
            return Err(FormError::Config(format!(
                "token_path must start with '/': {}",
                self.token_path
            )));
        }
        Ok(())
    }
}
