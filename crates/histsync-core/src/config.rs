//! Sync configuration with defaults and environment overrides.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `HISTSYNC_WORKERS` | [`SyncConfig::workers`] |
//! | `HISTSYNC_MAX_IN_FLIGHT` | [`SyncConfig::max_in_flight`] |
//! | `HISTSYNC_REQUESTS_PER_SECOND` | [`SyncConfig::requests_per_second`] |
//! | `HISTSYNC_TIMEOUT_MS` | [`SyncConfig::request_timeout_ms`] |
//! | `HISTSYNC_BASE_URL` | [`SyncConfig::base_url`] |
//!
//! Unset, blank, or unparsable values leave the default in place.

use std::env;
use std::sync::Arc;

use crate::http_client::ReqwestHttpClient;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryConfig;
use crate::source::{MseSource, DEFAULT_BASE_URL};

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Worker threads in the dispatcher pool.
    pub workers: usize,
    /// Concurrent requests allowed per worker.
    pub max_in_flight: usize,
    /// Optional pacing of request starts per worker.
    pub requests_per_second: Option<u32>,
    /// Days of history requested for an issuer seen for the first time.
    pub history_days: u32,
    /// Days covered by one history request.
    pub window_days: u32,
    pub request_timeout_ms: u64,
    pub base_url: String,
    pub retry: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workers: 12,
            max_in_flight: 10,
            requests_per_second: None,
            history_days: 3650,
            window_days: 365,
            request_timeout_ms: 30_000,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `HISTSYNC_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|name| env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        if let Some(workers) = value("HISTSYNC_WORKERS").and_then(|raw| raw.parse().ok()) {
            self.workers = workers;
        }
        if let Some(limit) = value("HISTSYNC_MAX_IN_FLIGHT").and_then(|raw| raw.parse().ok()) {
            self.max_in_flight = limit;
        }
        if let Some(rate) = value("HISTSYNC_REQUESTS_PER_SECOND").and_then(|raw| raw.parse().ok()) {
            self.requests_per_second = Some(rate);
        }
        if let Some(timeout) = value("HISTSYNC_TIMEOUT_MS").and_then(|raw| raw.parse().ok()) {
            self.request_timeout_ms = timeout;
        }
        if let Some(base_url) = value("HISTSYNC_BASE_URL") {
            self.base_url = base_url;
        }
        self
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.max_in_flight, self.requests_per_second)
    }

    /// A remote source over a fresh reqwest client and limiter.
    pub fn mse_source(&self) -> MseSource {
        MseSource::new(Arc::new(ReqwestHttpClient::new()), self.rate_limiter())
            .with_base_url(self.base_url.clone())
            .with_retry(self.retry.clone())
            .with_timeout_ms(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_pipeline_limits() {
        let config = SyncConfig::default();

        assert_eq!(config.workers, 12);
        assert_eq!(config.max_in_flight, 10);
        assert_eq!(config.history_days, 3650);
        assert_eq!(config.window_days, 365);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.base_url, "https://www.mse.mk");
    }

    #[test]
    fn overrides_replace_only_valid_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("HISTSYNC_WORKERS", " 4 "),
            ("HISTSYNC_MAX_IN_FLIGHT", "many"),
            ("HISTSYNC_REQUESTS_PER_SECOND", "5"),
            ("HISTSYNC_BASE_URL", ""),
        ]);

        let config = SyncConfig::default()
            .with_overrides(|name| vars.get(name).map(|value| value.to_string()));

        assert_eq!(config.workers, 4);
        assert_eq!(config.max_in_flight, 10);
        assert_eq!(config.requests_per_second, Some(5));
        assert_eq!(config.base_url, "https://www.mse.mk");
    }
}
