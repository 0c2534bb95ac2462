//! Storage backends behind the cache facade
//!
//! Both backends implement [`KeyValueStore`]. Values are opaque bytes here;
//! encoding happens in the facade.

mod memory;
mod remote;

pub use self::memory::MemoryStore;
pub use self::remote::{RedisStore, RemoteSettings};

use crate::error::{CacheError, CacheResult};
use async_trait::async_trait;
use std::time::Duration;

/// Longest expiry either backend accepts (one century)
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Capability set shared by the remote store and the local fallback
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get raw bytes, `None` when absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Overwrite `key`. `None` stores without expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()>;

    /// Returns true iff a key was removed
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    async fn exists(&self, key: &str) -> CacheResult<bool>;

    /// Add `delta` to an integer value. Absent keys start at 0; an existing expiry is kept.
    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64>;

    /// Decrement by one, clamping at zero in the same atomic step.
    /// A clamped key gets `ttl` so it cannot outlive its counter.
    async fn decr_floor(&self, key: &str, ttl: Duration) -> CacheResult<i64>;

    /// Increment by one and arm `ttl` when the key is new or has no expiry,
    /// in one atomic step. A running window keeps its deadline.
    async fn incr_window(&self, key: &str, ttl: Duration) -> CacheResult<i64>;

    /// Increment by one and reset the expiry to `ttl` in one atomic step
    async fn incr_refresh(&self, key: &str, ttl: Duration) -> CacheResult<i64>;

    /// Arm the expiry of an existing key. Returns false when the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remove every key
    async fn flush(&self) -> CacheResult<()>;

    async fn ping(&self) -> CacheResult<()>;
}

/// Reject expiries beyond [`MAX_TTL`]
pub(crate) fn check_ttl(ttl: Duration) -> CacheResult<Duration> {
    if ttl > MAX_TTL {
        return Err(CacheError::InvalidData(format!(
            "TTL of {}s exceeds the {}s limit",
            ttl.as_secs(),
            MAX_TTL.as_secs()
        )));
    }
    Ok(ttl)
}

/// Whole seconds for a TTL, never below one
pub(crate) fn ttl_secs(ttl: Duration) -> CacheResult<u64> {
    Ok(check_ttl(ttl)?.as_secs().max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_secs_bounds() {
        assert_eq!(ttl_secs(Duration::from_millis(10)).unwrap(), 1);
        assert_eq!(ttl_secs(MAX_TTL).unwrap(), MAX_TTL.as_secs());
        assert!(matches!(
            ttl_secs(Duration::from_secs(u64::MAX)),
            Err(CacheError::InvalidData(_))
        ));
    }
}
