//! Live viewer counters
//!
//! Counters live under `viewers:{stream_id}` and never go below zero.

use std::time::Duration;

use crate::cache::StreamCache;
use crate::keys::CacheKey;
use crate::store::KeyValueStore;
use crate::ttl;

impl<R: KeyValueStore + 'static> StreamCache<R> {
    /// Viewer joined. Re-arms the counter TTL; returns 0 on backend failure.
    pub async fn increment_viewer_count(&self, stream_id: &str) -> i64 {
        let key = CacheKey::viewers(stream_id);
        let lifetime = Duration::from_secs(ttl::VIEWERS);

        self.dispatch("viewers_incr", &key, |store| store.incr_refresh(&key, lifetime))
            .await
            .unwrap_or(0)
    }

    /// Viewer left. Clamped at zero; returns 0 on backend failure.
    pub async fn decrement_viewer_count(&self, stream_id: &str) -> i64 {
        let key = CacheKey::viewers(stream_id);
        let lifetime = Duration::from_secs(ttl::VIEWERS);

        self.dispatch("viewers_decr", &key, |store| store.decr_floor(&key, lifetime))
            .await
            .map(|count| count.max(0))
            .unwrap_or(0)
    }

    pub async fn get_viewer_count(&self, stream_id: &str) -> i64 {
        let key = CacheKey::viewers(stream_id);
        self.get_counter(&key)
            .await
            .ok()
            .flatten()
            .map(|count| count.max(0))
            .unwrap_or(0)
    }

    /// Drop the counter when a stream ends
    pub async fn reset_viewer_count(&self, stream_id: &str) -> bool {
        self.delete(&CacheKey::viewers(stream_id)).await
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::tests::{connected_cache, fallback_cache};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test]
    async fn test_counter_floor() {
        let cache = fallback_cache();

        assert_eq!(cache.decrement_viewer_count("s1").await, 0);
        assert_eq!(cache.get_viewer_count("s1").await, 0);
        assert_eq!(cache.decrement_viewer_count("s1").await, 0);
        assert_eq!(cache.get_viewer_count("s1").await, 0);
        assert_eq!(cache.increment_viewer_count("s1").await, 1);
        assert_eq!(cache.get_viewer_count("s1").await, 1);
    }

    #[tokio::test]
    async fn test_counter_never_negative_for_any_sequence() {
        let cache = fallback_cache();
        let ops = [false, true, true, false, false, false, true, false, true, true];
        let mut expected: i64 = 0;

        for increment in ops {
            let count = if increment {
                expected += 1;
                cache.increment_viewer_count("s2").await
            } else {
                expected = (expected - 1).max(0);
                cache.decrement_viewer_count("s2").await
            };
            assert_eq!(count, expected);
            assert!(cache.get_viewer_count("s2").await >= 0);
        }
    }

    #[tokio::test]
    async fn test_get_absent_counter_is_zero() {
        let cache = fallback_cache();
        assert_eq!(cache.get_viewer_count("nobody-watching").await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_rearms_ttl() {
        let cache = fallback_cache();
        cache.increment_viewer_count("s3").await;

        tokio::time::advance(Duration::from_secs(3000)).await;
        cache.increment_viewer_count("s3").await;

        tokio::time::advance(Duration::from_secs(3000)).await;
        assert_eq!(cache.get_viewer_count("s3").await, 2);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(cache.get_viewer_count("s3").await, 0);
    }

    #[tokio::test]
    async fn test_reset_viewer_count() {
        let cache = fallback_cache();
        cache.increment_viewer_count("s4").await;
        assert!(cache.reset_viewer_count("s4").await);
        assert_eq!(cache.get_viewer_count("s4").await, 0);
    }

    #[tokio::test]
    async fn test_counters_default_to_zero_on_backend_failure() {
        let (cache, remote, _state) = connected_cache();
        assert_eq!(cache.increment_viewer_count("s5").await, 1);

        remote.reachable.store(false, Ordering::SeqCst);
        assert_eq!(cache.increment_viewer_count("s5").await, 0);
        assert_eq!(cache.decrement_viewer_count("s5").await, 0);
        assert_eq!(cache.get_viewer_count("s5").await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let cache = fallback_cache();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.increment_viewer_count("hot").await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.get_viewer_count("hot").await, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_increment_arms_ttl_in_the_same_step() {
        let cache = fallback_cache();
        assert_eq!(cache.increment_viewer_count("s6").await, 1);

        let key = crate::keys::CacheKey::viewers("s6");
        assert_eq!(
            cache.local_store().ttl(&key),
            Some(Duration::from_secs(crate::ttl::VIEWERS))
        );
    }

    #[tokio::test]
    async fn test_failed_increment_is_not_counted() {
        let (cache, remote, _state) = connected_cache();
        remote.reachable.store(false, Ordering::SeqCst);
        assert_eq!(cache.increment_viewer_count("s7").await, 0);

        remote.reachable.store(true, Ordering::SeqCst);
        assert_eq!(cache.get_viewer_count("s7").await, 0);
        assert_eq!(cache.increment_viewer_count("s7").await, 1);
    }
}
