//! Remote store adapter backed by a Redis connection manager
//!
//! Owns the connection lifecycle and is the only writer of the backend mode.
//! Connectivity faults flip the mode to fallback and wake a supervisor task
//! that retries with capped backoff.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisResult, Script};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::{ttl_secs, KeyValueStore};
use crate::backoff::BackoffConfig;
use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::state::{BackendMode, ConnectionState};

/// DECR that never goes below zero; a clamped key gets a fresh TTL
const DECR_FLOOR_SCRIPT: &str = r"
local value = redis.call('DECR', KEYS[1])
if value < 0 then
  redis.call('SET', KEYS[1], 0, 'EX', ARGV[1])
  value = 0
end
return value
";

/// INCR that arms the window on first use or when the key lost its expiry
const INCR_WINDOW_SCRIPT: &str = r"
local value = redis.call('INCR', KEYS[1])
if value == 1 or redis.call('TTL', KEYS[1]) == -1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return value
";

/// INCR that always resets the expiry
const INCR_REFRESH_SCRIPT: &str = r"
local value = redis.call('INCR', KEYS[1])
redis.call('EXPIRE', KEYS[1], ARGV[1])
return value
";

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub url: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    pub reconnect: BackoffConfig,
}

impl RemoteSettings {
    pub fn from_config(url: String, config: &CacheConfig) -> Self {
        Self {
            url,
            connect_timeout: config.connect_timeout,
            command_timeout: config.command_timeout,
            reconnect: BackoffConfig {
                max_attempts: config.max_reconnect_attempts,
                initial: config.reconnect_backoff,
                max: config.max_reconnect_backoff,
                ..Default::default()
            },
        }
    }
}

struct Shared {
    client: Client,
    settings: RemoteSettings,
    connection: RwLock<Option<ConnectionManager>>,
    state: ConnectionState,
    outage: Notify,
    decr_floor: Script,
    incr_window: Script,
    incr_refresh: Script,
}

impl Shared {
    fn connection(&self) -> Option<ConnectionManager> {
        self.connection.read().clone()
    }

    /// Open a fresh connection and verify it with PING, both bounded by the connect timeout
    async fn open(&self) -> CacheResult<()> {
        let limit = self.settings.connect_timeout;
        let mut manager = timeout(limit, ConnectionManager::new(self.client.clone()))
            .await
            .map_err(|_| CacheError::Timeout(limit))??;
        timeout(
            limit,
            redis::cmd("PING").query_async::<_, String>(&mut manager),
        )
        .await
        .map_err(|_| CacheError::Timeout(limit))??;

        *self.connection.write() = Some(manager);
        self.state.transition(BackendMode::Connected);
        Ok(())
    }

    fn mark_disconnected(&self, cause: &CacheError) {
        if self.state.current() != BackendMode::Connected {
            return;
        }
        self.connection.write().take();
        if self.state.transition(BackendMode::Fallback) {
            warn!(error = %cause, "Redis connection lost");
            self.outage.notify_one();
        }
    }

    fn is_closed(&self) -> bool {
        self.state.current() == BackendMode::Closed
    }
}

/// Waits for outages and reconnects, up to the configured attempts per outage
async fn supervise(shared: Arc<Shared>) {
    let max_attempts = shared.settings.reconnect.max_attempts;

    loop {
        shared.outage.notified().await;
        if shared.is_closed() {
            break;
        }

        let mut recovered = false;
        for (attempt, delay) in shared.settings.reconnect.delays().enumerate() {
            let attempt = attempt + 1;
            tokio::time::sleep(delay).await;
            if shared.is_closed() {
                return;
            }

            shared.state.transition(BackendMode::Connecting);
            match shared.open().await {
                Ok(()) => {
                    info!(attempt, "Reconnected to Redis");
                    recovered = true;
                    break;
                }
                Err(e) => {
                    shared.state.transition(BackendMode::Fallback);
                    warn!(attempt, max_attempts, error = %e, "Redis reconnect attempt failed");
                }
            }
        }

        if !recovered {
            error!(
                max_attempts,
                "Redis reconnect attempts exhausted, staying on in-memory store"
            );
            break;
        }
    }
}

/// Redis-backed [`KeyValueStore`]
pub struct RedisStore {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl RedisStore {
    /// Connect to Redis, taking ownership of the connection state.
    ///
    /// An unreachable server is not an error: the state is left in fallback
    /// and the supervisor keeps retrying. Only a malformed URL fails.
    pub async fn connect(settings: RemoteSettings, state: ConnectionState) -> CacheResult<Self> {
        let client = Client::open(settings.url.as_str())
            .map_err(|e| CacheError::Configuration(format!("invalid Redis URL: {}", e)))?;

        let shared = Arc::new(Shared {
            client,
            settings,
            connection: RwLock::new(None),
            state,
            outage: Notify::new(),
            decr_floor: Script::new(DECR_FLOOR_SCRIPT),
            incr_window: Script::new(INCR_WINDOW_SCRIPT),
            incr_refresh: Script::new(INCR_REFRESH_SCRIPT),
        });

        shared.state.transition(BackendMode::Connecting);
        match shared.open().await {
            Ok(()) => info!("Connected to Redis"),
            Err(e) => {
                warn!(error = %e, "Redis unavailable at startup, using in-memory store");
                shared.state.transition(BackendMode::Fallback);
                shared.outage.notify_one();
            }
        }

        let supervisor = tokio::spawn(supervise(shared.clone()));

        Ok(Self {
            shared,
            supervisor: Mutex::new(Some(supervisor)),
        })
    }

    pub fn mode(&self) -> BackendMode {
        self.shared.state.current()
    }

    /// Close the connection and stop reconnecting. Idempotent.
    pub fn close(&self) {
        if let Some(handle) = self.supervisor.lock().take() {
            handle.abort();
        }
        let had_connection = self.shared.connection.write().take().is_some();
        if self.shared.state.transition(BackendMode::Closed) {
            info!(had_connection, "Redis connection closed");
        }
    }

    /// Run one command under the command timeout, recording connectivity faults
    async fn run<T, F, Fut>(&self, op: &'static str, f: F) -> CacheResult<T>
    where
        F: FnOnce(ConnectionManager) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.shared.connection().ok_or(CacheError::Unavailable)?;
        let limit = self.shared.settings.command_timeout;

        let err = match timeout(limit, f(conn)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => CacheError::Redis(e),
            Err(_) => CacheError::Timeout(limit),
        };

        debug!(op, error = %err, "Redis command failed");
        if err.is_connectivity() {
            self.shared.mark_disconnected(&err);
        }
        Err(err)
    }

    /// Run a single-key counter script with a TTL argument
    async fn counter_script(
        &self,
        op: &'static str,
        script: &Script,
        key: &str,
        ttl: Duration,
    ) -> CacheResult<i64> {
        let secs = ttl_secs(ttl)?;
        self.run(op, |mut conn| async move {
            let mut invocation = script.prepare_invoke();
            invocation.key(key).arg(secs);
            invocation.invoke_async::<_, i64>(&mut conn).await
        })
        .await
    }
}

impl Drop for RedisStore {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        self.run("get", |mut conn| async move {
            conn.get::<_, Option<Vec<u8>>>(key).await
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> CacheResult<()> {
        let secs = ttl.map(ttl_secs).transpose()?;
        self.run("set", |mut conn| async move {
            match secs {
                Some(secs) => conn.set_ex::<_, _, ()>(key, value, secs).await,
                None => conn.set::<_, _, ()>(key, value).await,
            }
        })
        .await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.run("delete", |mut conn| async move {
            conn.del::<_, i64>(key).await.map(|removed| removed > 0)
        })
        .await
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.run("exists", |mut conn| async move {
            conn.exists::<_, bool>(key).await
        })
        .await
    }

    async fn incr_by(&self, key: &str, delta: i64) -> CacheResult<i64> {
        self.run("incr", |mut conn| async move {
            conn.incr::<_, _, i64>(key, delta).await
        })
        .await
    }

    async fn decr_floor(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.counter_script("decr_floor", &self.shared.decr_floor, key, ttl)
            .await
    }

    async fn incr_window(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.counter_script("incr_window", &self.shared.incr_window, key, ttl)
            .await
    }

    async fn incr_refresh(&self, key: &str, ttl: Duration) -> CacheResult<i64> {
        self.counter_script("incr_refresh", &self.shared.incr_refresh, key, ttl)
            .await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<bool> {
        // Bounded by MAX_TTL, so the cast cannot wrap
        let secs = ttl_secs(ttl)? as i64;
        self.run("expire", |mut conn| async move {
            conn.expire::<_, bool>(key, secs).await
        })
        .await
    }

    async fn flush(&self) -> CacheResult<()> {
        self.run("flush", |mut conn| async move {
            redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn).await
        })
        .await
    }

    async fn ping(&self) -> CacheResult<()> {
        self.run("ping", |mut conn| async move {
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map(|_| ())
        })
        .await
    }
}
