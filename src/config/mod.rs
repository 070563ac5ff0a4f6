//! Service endpoint configuration (layered: code > env).

use std::time::Duration;

use crate::error::{Result, TetherError};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection settings for the agent-execution service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the service, without a trailing slash.
    pub base_url: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<String>,
    /// Per-request timeout. Streaming requests use this for the initial
    /// response only; the open event stream is not bounded by it.
    pub timeout: Duration,
}

impl ServiceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load from environment variables (`TETHER_BASE_URL`, `TETHER_API_TOKEN`,
    /// `TETHER_TIMEOUT_SECS`). Reads `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let base_url = std::env::var("TETHER_BASE_URL")
            .map_err(|_| TetherError::Configuration("TETHER_BASE_URL is not set".into()))?;
        let mut config = Self::new(base_url);

        if let Ok(token) = std::env::var("TETHER_API_TOKEN") {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }
        if let Ok(secs) = std::env::var("TETHER_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                TetherError::Configuration(format!("invalid TETHER_TIMEOUT_SECS: {secs}"))
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
