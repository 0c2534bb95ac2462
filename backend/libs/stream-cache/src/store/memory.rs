//! In-process fallback store
//!
//! Expiry is enforced lazily on every read; the periodic sweep only bounds
//! memory for keys nobody reads again. Everything here is per-process.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::{check_ttl, KeyValueStore};
use crate::error::{CacheError, CacheResult};

/// Shortest period the background sweep runs at
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if now >= at)
    }
}

#[derive(Default)]
struct Entries {
    map: Mutex<HashMap<String, Entry>>,
}

impl Entries {
    fn sweep(&self, now: Instant) -> usize {
        let mut map = self.map.lock();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired(now));
        before - map.len()
    }
}

/// Local key/value table with per-key expiry
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the periodic expiry sweep.
    ///
    /// The task holds only a weak reference and exits once every clone of the
    /// store has been dropped.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let entries: Weak<Entries> = Arc::downgrade(&self.entries);
        if every < MIN_SWEEP_INTERVAL {
            warn!(
                requested_ms = every.as_millis() as u64,
                "Sweep interval too short, using {}s",
                MIN_SWEEP_INTERVAL.as_secs()
            );
        }
        let every = every.max(MIN_SWEEP_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(entries) = entries.upgrade() else {
                    debug!("Fallback store dropped, sweeper exiting");
                    break;
                };
                let evicted = entries.sweep(Instant::now());
                if evicted > 0 {
                    debug!(evicted, "Swept expired fallback entries");
                }
            }
        })
    }

    /// Evict every expired entry now. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.entries.sweep(Instant::now())
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        let mut map = self.entries.map.lock();
        let entry = map.get(key)?;
        if entry.is_expired(now) {
            map.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn set_bytes(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let expires_at = ttl.map(|ttl| deadline(Instant::now(), ttl)).transpose()?;
        self.entries
            .map
            .lock()
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    pub fn remove(&self, key: &str) -> bool {
        let now = Instant::now();
        match self.entries.map.lock().remove(key) {
            Some(entry) => !entry.is_expired(now),
            None => false,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get_bytes(key).is_some()
    }

    /// Read-modify-write a counter under one lock.
    ///
    /// `update` gets the live value (0 when absent or expired), its expiry and
    /// the current instant. Nothing is written when it fails.
    fn update_counter<F>(&self, key: &str, update: F) -> CacheResult<i64>
    where
        F: FnOnce(i64, Option<Instant>, Instant) -> CacheResult<(i64, Option<Instant>)>,
    {
        let now = Instant::now();
        let mut map = self.entries.map.lock();
        let (current, expires_at) = match map.get(key) {
            Some(entry) if !entry.is_expired(now) => (parse_counter(&entry.value)?, entry.expires_at),
            _ => (0, None),
        };

        let (next, expires_at) = update(current, expires_at, now)?;
        map.insert(
            key.to_string(),
            Entry {
                value: next.to_string().into_bytes(),
                expires_at,
            },
        );
        Ok(next)
    }

    pub fn incr_by_now(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.update_counter(key, |current, expires_at, _| {
            Ok((checked_incr(current, delta)?, expires_at))
        })
    }

    pub fn incr_window_now(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.update_counter(key, |current, expires_at, now| {
            let expires_at = match expires_at {
                Some(at) => at,
                None => deadline(now, ttl)?,
            };
            Ok((checked_incr(current, 1)?, Some(expires_at)))
        })
    }

    pub fn incr_refresh_now(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.update_counter(key, |current, _, now| {
            let expires_at = deadline(now, ttl)?;
            Ok((checked_incr(current, 1)?, Some(expires_at)))
        })
    }

    pub fn decr_floor_now(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.update_counter(key, |current, expires_at, now| {
            if current <= 0 {
                Ok((0, Some(deadline(now, ttl)?)))
            } else {
                Ok((current - 1, expires_at))
            }
        })
    }

    pub fn expire_now(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let expires_at = deadline(now, ttl)?;
        let mut map = self.entries.map.lock();
        let Some(entry) = map.get_mut(key) else {
            return Ok(false);
        };
        if entry.is_expired(now) {
            map.remove(key);
            return Ok(false);
        }
        entry.expires_at = Some(expires_at);
        Ok(true)
    }

    /// Remaining lifetime of a key; `None` when absent or without expiry
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let map = self.entries.map.lock();
        map.get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    pub fn clear(&self) {
        self.entries.map.lock().clear();
    }
}

fn deadline(now: Instant, ttl: Duration) -> CacheResult<Instant> {
    let ttl = check_ttl(ttl)?;
    now.checked_add(ttl)
        .ok_or_else(|| CacheError::InvalidData(format!("TTL of {}s is out of range", ttl.as_secs())))
}

fn checked_incr(current: i64, delta: i64) -> CacheResult<i64> {
    current
        .checked_add(delta)
        .ok_or_else(|| CacheError::InvalidData("increment would overflow".to_string()))
}

fn parse_counter(raw: &[u8]) -> CacheResult<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<i64>().ok())
        .ok_or_else(|| CacheError::InvalidData("value is not an integer".to_string()))
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.get_bytes(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        self.set_bytes(key, value, ttl)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.remove(key))
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        Ok(self.contains(key))
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.incr_by_now(key, delta)
    }

    async fn decr_floor(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.decr_floor_now(key, ttl)
    }

    async fn incr_window(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.incr_window_now(key, ttl)
    }

    async fn incr_refresh(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.incr_refresh_now(key, ttl)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        self.expire_now(key, ttl)
    }

    async fn flush(&self) -> CacheResult<()> {
        self.clear();
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }
}
