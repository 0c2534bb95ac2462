//! Resilient cache and rate-limiting layer
//!
//! Fronts a shared Redis cache and degrades to an in-process store whenever
//! Redis is unreachable or disabled:
//! - Uniform key/value/TTL API that never surfaces backend errors
//! - Session, stream metadata, viewer counter and rate limit views
//! - Bounded connect/command timeouts with capped reconnect attempts
//! - Lazy expiry plus a periodic sweep in the fallback store
//! - Metrics integration
//!
//! Data written during an outage stays in the fallback store and is not
//! replayed into Redis once the connection comes back.
//!
//! # Example
//!
//! ```no_run
//! use stream_cache::{CacheConfig, RateLimitConfig, StreamCache};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stream_cache::CacheError> {
//!     let cache = StreamCache::init(&CacheConfig::from_env()?).await?;
//!
//!     cache.set_session("u1", &serde_json::json!({"role": "admin"})).await;
//!     let viewers = cache.increment_viewer_count("live-42").await;
//!     let decision = cache
//!         .check_rate_limit("203.0.113.7", &RateLimitConfig::default())
//!         .await;
//!
//!     println!("viewers={} allowed={}", viewers, decision.allowed);
//!     cache.disconnect();
//!     Ok(())
//! }
//! ```

mod backoff;
mod cache;
mod config;
mod error;
mod keys;
mod metrics;
mod rate_limit;
mod session;
mod state;
mod viewers;

pub mod store;

pub use backoff::{Backoff, BackoffConfig};
pub use cache::{CacheHealth, StreamCache};
pub use config::{CacheConfig, DeploymentMode};
pub use error::{CacheError, CacheResult};
pub use keys::CacheKey;
pub use metrics::CacheMetrics;
pub use rate_limit::{RateLimitConfig, RateLimitDecision};
pub use state::{BackendMode, ConnectionState, ConnectionWatch};
pub use store::{KeyValueStore, MemoryStore, RedisStore, RemoteSettings};

/// Default TTL values (seconds)
pub mod ttl {
    pub const DEFAULT: u64 = 3600; // 1 hour
    pub const SESSION: u64 = 3600; // 1 hour
    pub const STREAM: u64 = 300; // 5 minutes
    pub const VIEWERS: u64 = 3600; // 1 hour, re-armed on every join
}
