//! Cache facade
//!
//! Reads the backend mode before every call and dispatches to the remote
//! store when connected, otherwise to the in-process store. Backend errors
//! never reach callers: each operation degrades to its documented default.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::metrics::CacheMetrics;
use crate::state::{BackendMode, ConnectionState, ConnectionWatch};
use crate::store::{KeyValueStore, MemoryStore, RedisStore, RemoteSettings};

/// Store selected for a single call
pub(crate) enum Backend<'a> {
    Remote(&'a dyn KeyValueStore),
    Local(&'a MemoryStore),
}

impl<'a> Backend<'a> {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Backend::Remote(_) => "redis",
            Backend::Local(_) => "memory",
        }
    }

    pub(crate) fn store(&self) -> &'a dyn KeyValueStore {
        match self {
            Backend::Remote(store) => *store,
            Backend::Local(store) => *store,
        }
    }
}

/// Snapshot for the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheHealth {
    pub mode: BackendMode,
    pub remote_configured: bool,
    pub healthy: bool,
    /// Serving from the in-process store while a remote store is configured
    pub degraded: bool,
}

/// Resilient cache with transparent in-process fallback
pub struct StreamCache<R = RedisStore> {
    remote: Option<Arc<R>>,
    local: MemoryStore,
    mode: ConnectionWatch,
    metrics: CacheMetrics,
}

impl<R> Clone for StreamCache<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
            local: self.local.clone(),
            mode: self.mode.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl StreamCache<RedisStore> {
    /// Build the cache from configuration.
    ///
    /// Fails only on configuration errors (e.g. no Redis host in production).
    /// An unreachable Redis leaves the cache in fallback mode.
    pub async fn init(config: &CacheConfig) -> CacheResult<Self> {
        let local = MemoryStore::new();
        local.spawn_sweeper(config.sweep_interval);

        let state = ConnectionState::new();
        let mode = state.subscribe();

        let remote = match config.remote_url()? {
            Some(url) => {
                let settings = RemoteSettings::from_config(url, config);
                Some(Arc::new(RedisStore::connect(settings, state).await?))
            }
            None => {
                state.transition(BackendMode::Fallback);
                None
            }
        };

        Ok(Self::from_parts(remote, local, mode))
    }

    /// Close the remote connection if open. Idempotent; the cache keeps
    /// serving from the in-process store afterwards.
    pub fn disconnect(&self) {
        if let Some(remote) = &self.remote {
            remote.close();
        }
    }
}

impl<R: KeyValueStore + 'static> StreamCache<R> {
    /// Assemble a cache from an existing remote store and the mode watch its
    /// connection state feeds.
    pub fn from_parts(remote: Option<Arc<R>>, local: MemoryStore, mode: ConnectionWatch) -> Self {
        Self {
            remote,
            local,
            mode,
            metrics: CacheMetrics::new(),
        }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode.current()
    }

    /// The in-process store, for housekeeping and inspection
    pub fn local_store(&self) -> &MemoryStore {
        &self.local
    }

    pub(crate) fn backend(&self) -> Backend<'_> {
        match (&self.remote, self.mode.current()) {
            (Some(remote), BackendMode::Connected) => Backend::Remote(remote.as_ref()),
            _ => Backend::Local(&self.local),
        }
    }

    /// Run `op` on the active backend, logging and counting the outcome
    pub(crate) async fn dispatch<'a, T, F, Fut>(
        &'a self,
        op: &'static str,
        key: &str,
        f: F,
    ) -> CacheResult<T>
    where
        F: FnOnce(&'a dyn KeyValueStore) -> Fut,
        Fut: Future<Output = CacheResult<T>>,
    {
        let backend = self.backend();
        let result = f(backend.store()).await;
        self.metrics
            .record_operation(op, backend.label(), result.is_ok());
        if let Err(e) = &result {
            warn!(op, key = %key, backend = backend.label(), error = %e, "Cache operation failed");
        }
        result
    }

    /// Store `value` as JSON. `ttl_secs == 0` stores without expiry.
    pub async fn set<T>(&self, key: &str, value: &T, ttl_secs: u64) -> bool
    where
        T: Serialize + Sync + ?Sized,
    {
        let data = match serde_json::to_vec(value) {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache serialization failed");
                return false;
            }
        };
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let ok = self
            .dispatch("set", key, |store| store.set(key, data, ttl))
            .await
            .is_ok();
        if ok {
            debug!(key = %key, ttl = ttl_secs, "Cache set");
        }
        ok
    }

    /// Decode the JSON value at `key`; misses, expired entries, backend
    /// faults and undecodable values all read as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self
            .dispatch("get", key, |store| store.get(key))
            .await
            .ok()
            .flatten();

        let Some(raw) = raw else {
            debug!(key = %key, "Cache miss");
            self.metrics.record_miss(key);
            return None;
        };

        match serde_json::from_slice::<T>(&raw) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                self.metrics.record_hit(key);
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache deserialization failed");
                self.metrics.record_miss(key);
                None
            }
        }
    }

    /// True iff a key was actually removed
    pub async fn delete(&self, key: &str) -> bool {
        self.dispatch("delete", key, |store| store.delete(key))
            .await
            .unwrap_or(false)
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.dispatch("exists", key, |store| store.exists(key))
            .await
            .unwrap_or(false)
    }

    /// Drop every key in the active backend
    pub async fn flush(&self) -> bool {
        self.dispatch("flush", "*", |store| store.flush())
            .await
            .is_ok()
    }

    /// Health probe. The in-process store is always healthy; in remote mode
    /// this is a round trip to the server.
    pub async fn ping(&self) -> bool {
        match self.backend() {
            Backend::Local(_) => true,
            backend @ Backend::Remote(_) => match backend.store().ping().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Remote cache ping failed");
                    false
                }
            },
        }
    }

    pub async fn health(&self) -> CacheHealth {
        let healthy = self.ping().await;
        let mode = self.mode();
        let remote_configured = self.remote.is_some();
        CacheHealth {
            mode,
            remote_configured,
            healthy,
            degraded: remote_configured && mode.is_using_fallback(),
        }
    }

    /// Raw integer read used by the counter views
    pub(crate) async fn get_counter(&self, key: &str) -> CacheResult<Option<i64>> {
        let raw = self.dispatch("get", key, |store| store.get(key)).await?;
        raw.map(|bytes| {
            std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.trim().parse::<i64>().ok())
                .ok_or_else(|| CacheError::InvalidData(format!("{} is not a counter", key)))
        })
        .transpose()
    }
}
