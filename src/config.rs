use anyhow::{Context, Result};
use url::Url;

use crate::client::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend API root; endpoint paths are joined onto it.
    pub api_base: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:5000/api/".to_string(),
            request_timeout_secs: 30,
            max_retries: 2,
            retry_base_ms: 200,
            retry_max_ms: 3000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            api_base: std::env::var("EVALBOARD_API_BASE").unwrap_or(d.api_base),
            request_timeout_secs: std::env::var("EVALBOARD_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.request_timeout_secs),
            max_retries: std::env::var("EVALBOARD_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(d.max_retries),
            retry_base_ms: std::env::var("EVALBOARD_RETRY_BASE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_base_ms),
            retry_max_ms: std::env::var("EVALBOARD_RETRY_MAX_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(d.retry_max_ms),
        }
    }

    /// Base URL with a trailing slash so relative joins keep the `/api` prefix.
    pub fn base_url(&self) -> Result<Url> {
        let mut raw = self.api_base.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).with_context(|| format!("invalid EVALBOARD_API_BASE: {}", self.api_base))
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay_ms: self.retry_base_ms,
            max_delay_ms: self.retry_max_ms,
            ..RetryConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let cfg = Config {
            api_base: "http://backend:5000/api".to_string(),
            ..Default::default()
        };
        let url = cfg.base_url().unwrap();
        assert_eq!(url.as_str(), "http://backend:5000/api/");
        assert_eq!(
            url.join("systems/abc/outputs").unwrap().as_str(),
            "http://backend:5000/api/systems/abc/outputs"
        );
    }

    #[test]
    fn test_invalid_base_rejected() {
        let cfg = Config {
            api_base: "not a url".to_string(),
            ..Default::default()
        };
        assert!(cfg.base_url().is_err());
    }

    #[test]
    fn test_retry_carries_limits() {
        let cfg = Config {
            max_retries: 5,
            retry_base_ms: 10,
            retry_max_ms: 50,
            ..Default::default()
        };
        let retry = cfg.retry();
        assert_eq!(retry.max_retries, 5);
        assert_eq!(retry.base_delay_ms, 10);
        assert_eq!(retry.max_delay_ms, 50);
    }
}
