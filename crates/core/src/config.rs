use std::time::Duration;

use crate::errors::CoreError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Settings for the API client, polling and the persisted query cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the backend REST API, without a trailing slash.
    pub base_url: String,

    /// Per-request timeout (ignored on wasm32, where the browser owns timeouts).
    pub request_timeout: Duration,

    /// Holdings refetch interval while the exchange reports the market open.
    pub open_market_poll_interval: Duration,

    /// Holdings refetch interval while the market is closed or unknown.
    pub closed_market_poll_interval: Duration,

    /// Retention ceiling for persisted and unobserved cache entries.
    pub cache_max_age: Duration,

    /// Storage key the cache snapshot is written under.
    pub persistence_key: String,

    /// Snapshots written with a different buster are discarded on restore.
    pub persistence_buster: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            open_market_poll_interval: Duration::from_secs(2),
            closed_market_poll_interval: Duration::from_secs(600),
            cache_max_age: Duration::from_secs(24 * 60 * 60),
            persistence_key: "portfolio-dashboard-cache".to_string(),
            persistence_buster: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ClientConfig {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset or unparsable.
    ///
    /// - `PORTFOLIO_API_URL`
    /// - `PORTFOLIO_API_TIMEOUT_SECS`
    /// - `PORTFOLIO_CACHE_KEY`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("PORTFOLIO_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            request_timeout: std::env::var("PORTFOLIO_API_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            persistence_key: std::env::var("PORTFOLIO_CACHE_KEY")
                .unwrap_or(defaults.persistence_key),
            ..defaults
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.base_url.trim().is_empty() {
            return Err(CoreError::ValidationError("base_url must not be empty".into()));
        }
        if self.open_market_poll_interval.is_zero() || self.closed_market_poll_interval.is_zero() {
            return Err(CoreError::ValidationError(
                "poll intervals must be greater than zero".into(),
            ));
        }
        if self.cache_max_age.is_zero() {
            return Err(CoreError::ValidationError(
                "cache_max_age must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
