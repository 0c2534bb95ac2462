//! Session and stream metadata views
//!
//! Thin prefixed wrappers over the facade's JSON get/set.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::StreamCache;
use crate::keys::CacheKey;
use crate::store::KeyValueStore;
use crate::ttl;

impl<R: KeyValueStore + 'static> StreamCache<R> {
    /// Store a user's session for [`ttl::SESSION`] seconds
    pub async fn set_session<T>(&self, user_id: &str, session: &T) -> bool
    where
        T: Serialize + Sync + ?Sized,
    {
        self.set_session_with_ttl(user_id, session, ttl::SESSION)
            .await
    }

    pub async fn set_session_with_ttl<T>(&self, user_id: &str, session: &T, ttl_secs: u64) -> bool
    where
        T: Serialize + Sync + ?Sized,
    {
        self.set(&CacheKey::session(user_id), session, ttl_secs)
            .await
    }

    pub async fn get_session<T: DeserializeOwned>(&self, user_id: &str) -> Option<T> {
        self.get(&CacheKey::session(user_id)).await
    }

    /// Drop a session, e.g. on logout
    pub async fn delete_session(&self, user_id: &str) -> bool {
        self.delete(&CacheKey::session(user_id)).await
    }

    /// Cache stream metadata for [`ttl::STREAM`] seconds
    pub async fn set_stream_data<T>(&self, stream_id: &str, data: &T) -> bool
    where
        T: Serialize + Sync + ?Sized,
    {
        self.set_stream_data_with_ttl(stream_id, data, ttl::STREAM)
            .await
    }

    pub async fn set_stream_data_with_ttl<T>(&self, stream_id: &str, data: &T, ttl_secs: u64) -> bool
    where
        T: Serialize + Sync + ?Sized,
    {
        self.set(&CacheKey::stream(stream_id), data, ttl_secs).await
    }

    pub async fn get_stream_data<T: DeserializeOwned>(&self, stream_id: &str) -> Option<T> {
        self.get(&CacheKey::stream(stream_id)).await
    }

    pub async fn delete_stream_data(&self, stream_id: &str) -> bool {
        self.delete(&CacheKey::stream(stream_id)).await
    }
}
