//! Fixed-window rate limiting on top of the cache facade
//!
//! The first request of a window creates the counter and arms its expiry in
//! the same atomic step; every later request in the window shares that
//! counter and expiry.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::StreamCache;
use crate::keys::CacheKey;
use crate::store::KeyValueStore;

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u64,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window_seconds: 900, // 15 minutes
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub current: u64,
}

impl RateLimitDecision {
    fn evaluate(current: u64, limit: u64) -> Self {
        Self {
            allowed: current <= limit,
            remaining: limit.saturating_sub(current),
            current,
        }
    }

    /// Used when the counter cannot be read; never blocks traffic
    fn permissive(limit: u64) -> Self {
        Self {
            allowed: true,
            remaining: limit,
            current: 0,
        }
    }
}

impl<R: KeyValueStore + 'static> StreamCache<R> {
    /// Count one request for `identifier` (usually an IP or account id)
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        config: &RateLimitConfig,
    ) -> RateLimitDecision {
        let key = CacheKey::rate_limit(identifier);
        let window = Duration::from_secs(config.window_seconds.max(1));

        let result = self
            .dispatch("rate_limit", &key, |store| store.incr_window(&key, window))
            .await;

        match result {
            Ok(current) => {
                RateLimitDecision::evaluate(u64::try_from(current).unwrap_or(0), config.max_requests)
            }
            Err(_) => {
                tracing::warn!(identifier = %identifier, "Rate limit check failed, allowing request");
                RateLimitDecision::permissive(config.max_requests)
            }
        }
    }
}
