//! Dashboard configuration
//!
//! Defaults come straight from [`crate::constants`]; there is no config file.

use crate::constants::{
    CACHE_TTL_SECS, COINGECKO_API_URL, DEFAULT_PER_PAGE, DEFAULT_VS_CURRENCY, INITIAL_BACKOFF_MS,
    LISTING_REFRESH_INTERVAL_SECS, MAX_BACKOFF_MS, MAX_RETRY_ATTEMPTS, SEARCH_DEBOUNCE_MS,
    SUMMARY_REFRESH_INTERVAL_SECS,
};
use std::env;
use std::time::Duration;

/// Overrides the upstream base URL, e.g. to point at a proxy
pub const API_URL_ENV: &str = "MARKET_DASHBOARD_API_URL";

/// Retry with exponential backoff, applied by the tracker to each fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 behaves like 1
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before attempt `attempt + 1`, where `attempt` starts at 1
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(MAX_BACKOFF_MS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Target currency for listings and summary values
    pub currency: String,
    /// Entries per listing page
    pub page_size: u32,
    pub listing_refresh_interval: Duration,
    pub summary_refresh_interval: Duration,
    pub search_debounce: Duration,
    /// Idle pages other than the active one are evicted after this long
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_VS_CURRENCY.to_string(),
            page_size: DEFAULT_PER_PAGE,
            listing_refresh_interval: Duration::from_secs(LISTING_REFRESH_INTERVAL_SECS),
            summary_refresh_interval: Duration::from_secs(SUMMARY_REFRESH_INTERVAL_SECS),
            search_debounce: Duration::from_millis(SEARCH_DEBOUNCE_MS),
            cache_ttl: Duration::from_secs(CACHE_TTL_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Upstream base URL from the environment, falling back to the public API
pub fn api_url_from_env() -> String {
    env::var(API_URL_ENV)
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| COINGECKO_API_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::tests::with_env_vars;

    #[test]
    fn defaults_follow_constants() {
        let config = DashboardConfig::default();
        assert_eq!(config.currency, "usd");
        assert_eq!(config.page_size, 50);
        assert_eq!(config.search_debounce, Duration::from_millis(300));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(5));
        assert_eq!(policy.backoff(40), Duration::from_secs(5));
    }

    #[test]
    fn api_url_honours_env_override() {
        let url = with_env_vars(&[(API_URL_ENV, Some(" http://localhost:8080/api "))], api_url_from_env);
        assert_eq!(url, "http://localhost:8080/api");

        let url = with_env_vars(&[(API_URL_ENV, Some(""))], api_url_from_env);
        assert_eq!(url, COINGECKO_API_URL);
    }
}
