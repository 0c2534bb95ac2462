//! Cache error types

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    /// Required settings missing or malformed. The only error that escapes `init`.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote store unavailable")]
    Unavailable,

    #[error("Invalid cache data: {0}")]
    InvalidData(String),
}

impl CacheError {
    /// Whether the error means the remote connection can no longer be trusted.
    pub fn is_connectivity(&self) -> bool {
        match self {
            CacheError::Redis(e) => {
                e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
            }
            CacheError::Timeout(_) | CacheError::Unavailable => true,
            _ => false,
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::Configuration("REDIS_HOST missing".to_string());
        assert_eq!(err.to_string(), "Configuration error: REDIS_HOST missing");

        let err = CacheError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Operation timed out after 250ms");
    }

    #[test]
    fn test_error_from_serde() {
        let json_err = serde_json::from_str::<String>("not json").unwrap_err();
        let err: CacheError = json_err.into();
        assert!(matches!(err, CacheError::Serialization(_)));
        assert!(!err.is_connectivity());
    }

    #[test]
    fn test_connectivity_classification() {
        assert!(CacheError::Unavailable.is_connectivity());
        assert!(CacheError::Timeout(Duration::from_secs(1)).is_connectivity());
        assert!(!CacheError::InvalidData("nan".into()).is_connectivity());

        let io = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset by peer",
        ));
        assert!(CacheError::Redis(io).is_connectivity());

        let typed = redis::RedisError::from((redis::ErrorKind::TypeError, "wrong type"));
        assert!(!CacheError::Redis(typed).is_connectivity());
    }
}
