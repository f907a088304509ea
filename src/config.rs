//! Client configuration

use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the analytics service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Service root, e.g. `https://analytics.example.com/api/`
    pub base_url: String,
    /// Per-request timeout, enforced by the transport
    pub timeout_secs: u64,
    /// Bearer token obtained by the host application's auth flow
    pub api_token: Option<String>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_token: None,
            user_agent: format!("{}/{}", crate::PRODUCER_NAME, crate::VERSION),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Check that the base URL is absolute http(s) and the timeout is non-zero
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| AnalyticsError::Config(format!("base_url {:?}: {}", self.base_url, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AnalyticsError::Config(format!(
                "base_url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.timeout_secs == 0 {
            return Err(AnalyticsError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL guaranteed to end in `/` so relative joins keep the path prefix
    pub fn base_url(&self) -> Result<reqwest::Url, AnalyticsError> {
        let mut base = self.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        reqwest::Url::parse(&base).map_err(|e| AnalyticsError::Config(e.to_string()))
    }

    /// Load configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self, AnalyticsError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
