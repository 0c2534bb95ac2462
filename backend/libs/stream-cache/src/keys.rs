//! Cache key schema
//!
//! Every logical record the facade exposes lives under a fixed prefix.
//! Key format: {entity}:{identifier}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    pub const SESSION: &'static str = "session";
    pub const STREAM: &'static str = "stream";
    pub const VIEWERS: &'static str = "viewers";
    pub const RATE_LIMIT: &'static str = "ratelimit";

    /// Session payload for a user
    /// Format: session:{user_id}
    pub fn session(user_id: &str) -> String {
        format!("{}:{}", Self::SESSION, user_id)
    }

    /// Short-lived stream metadata
    /// Format: stream:{stream_id}
    pub fn stream(stream_id: &str) -> String {
        format!("{}:{}", Self::STREAM, stream_id)
    }

    /// Live viewer counter
    /// Format: viewers:{stream_id}
    pub fn viewers(stream_id: &str) -> String {
        format!("{}:{}", Self::VIEWERS, stream_id)
    }

    /// Fixed-window request counter, usually keyed by IP or account id
    /// Format: ratelimit:{identifier}
    pub fn rate_limit(identifier: &str) -> String {
        format!("{}:{}", Self::RATE_LIMIT, identifier)
    }

    /// Extract entity type from key (the segment before the first ':')
    pub fn entity_type(key: &str) -> Option<&str> {
        match key.split_once(':') {
            Some((entity, _)) if !entity.is_empty() => Some(entity),
            _ => None,
        }
    }
}
