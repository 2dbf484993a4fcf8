//! Rate Limiting Module
//!
//! Per-caller rate limiting using the governor library. Cron endpoints are
//! keyed on the forwarded client IP under the `cron` category.

use governor::{
    clock::DefaultClock,
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{collections::HashMap, num::NonZeroU32, sync::Arc};
use tokio::sync::RwLock;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Per-key rate limiter for IP-based limiting
pub struct KeyedRateLimiter {
    limiters: RwLock<HashMap<String, Arc<Limiter>>>,
    quota: Quota,
    cleanup_threshold: usize,
}

impl KeyedRateLimiter {
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN))
                .allow_burst(NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiters: RwLock::new(HashMap::new()),
            quota,
            cleanup_threshold: 10000,
        }
    }

    /// Check if a key is allowed another request
    pub async fn check(&self, key: &str) -> bool {
        let limiter = {
            let limiters = self.limiters.read().await;
            limiters.get(key).cloned()
        };

        let limiter = match limiter {
            Some(l) => l,
            None => {
                let mut limiters = self.limiters.write().await;

                if limiters.len() > self.cleanup_threshold {
                    limiters.clear();
                }

                let new_limiter = Arc::new(RateLimiter::direct(self.quota));
                limiters.insert(key.to_string(), Arc::clone(&new_limiter));
                new_limiter
            }
        };

        limiter.check().is_ok()
    }
}

impl std::fmt::Debug for KeyedRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedRateLimiter")
            .field("cleanup_threshold", &self.cleanup_threshold)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per second for cron endpoints
    pub cron_rps: u32,
    /// Burst size for cron endpoints
    pub cron_burst: u32,
    /// Enable rate limiting
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            cron_rps: 5,
            cron_burst: 10,
            enabled: true,
        }
    }
}

#[derive(Debug)]
pub struct RateLimitState {
    pub config: RateLimitConfig,
    pub cron_limiter: KeyedRateLimiter,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            cron_limiter: KeyedRateLimiter::new(config.cron_rps, config.cron_burst),
            config,
        }
    }

    pub fn from_env() -> Self {
        let config = RateLimitConfig {
            cron_rps: std::env::var("RATE_LIMIT_CRON_RPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            cron_burst: std::env::var("RATE_LIMIT_CRON_BURST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            enabled: std::env::var("RATE_LIMIT_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        };
        Self::new(config)
    }

    /// Check the `cron` category for a caller key. Always allowed when rate
    /// limiting is disabled.
    pub async fn check_cron(&self, key: &str) -> bool {
        if !self.config.enabled {
            return true;
        }
        self.cron_limiter.check(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    #[tokio::test]
    async fn test_burst_then_rejection() {
        test_util::setup();
        let state = RateLimitState::new(RateLimitConfig {
            cron_rps: 1,
            cron_burst: 2,
            enabled: true,
        });

        assert!(state.check_cron("10.0.0.1").await);
        assert!(state.check_cron("10.0.0.1").await);
        assert!(!state.check_cron("10.0.0.1").await);
        // A different caller has its own bucket.
        assert!(state.check_cron("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_disabled_limiter_always_allows() {
        test_util::setup();
        let state = RateLimitState::new(RateLimitConfig {
            cron_rps: 1,
            cron_burst: 1,
            enabled: false,
        });

        for _ in 0..10 {
            assert!(state.check_cron("10.0.0.1").await);
        }
    }
}
