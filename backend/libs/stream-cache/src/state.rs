//! Backend mode shared between the remote adapter and the facade
//!
//! The adapter owns the only [`ConnectionState`] (the writer); the facade
//! holds a [`ConnectionWatch`] and reads the current mode before every call.

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::metrics::CacheMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// No connect attempt made yet
    Uninitialized,
    /// Connect or reconnect in flight
    Connecting,
    /// Remote store reachable; operations go to it
    Connected,
    /// Remote store unreachable or disabled; operations go to the local store
    Fallback,
    /// Shut down via `disconnect`
    Closed,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Uninitialized => "uninitialized",
            BackendMode::Connecting => "connecting",
            BackendMode::Connected => "connected",
            BackendMode::Fallback => "fallback",
            BackendMode::Closed => "closed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, BackendMode::Connected)
    }

    pub fn is_using_fallback(&self) -> bool {
        !self.is_connected()
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single writer of the backend mode
#[derive(Debug)]
pub struct ConnectionState {
    tx: watch::Sender<BackendMode>,
}

impl ConnectionState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(BackendMode::Uninitialized);
        Self { tx }
    }

    pub fn current(&self) -> BackendMode {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> ConnectionWatch {
        ConnectionWatch {
            rx: self.tx.subscribe(),
        }
    }

    /// Move to `next`. Returns false when already there or the state is closed.
    pub fn transition(&self, next: BackendMode) -> bool {
        let mut previous = next;
        let changed = self.tx.send_if_modified(|mode| {
            if *mode == next || *mode == BackendMode::Closed {
                return false;
            }
            previous = *mode;
            *mode = next;
            true
        });

        if changed {
            CacheMetrics::new().record_mode(next);
            match next {
                BackendMode::Fallback if previous == BackendMode::Connected => {
                    warn!(from = %previous, to = %next, "Remote cache lost, switching to in-memory store");
                }
                _ => info!(from = %previous, to = %next, "Cache backend mode changed"),
            }
        }
        changed
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of the backend mode
#[derive(Debug, Clone)]
pub struct ConnectionWatch {
    rx: watch::Receiver<BackendMode>,
}

impl ConnectionWatch {
    pub fn current(&self) -> BackendMode {
        *self.rx.borrow()
    }

    /// Wait until the mode satisfies `predicate`
    pub async fn wait_for<P>(&mut self, mut predicate: P) -> BackendMode
    where
        P: FnMut(BackendMode) -> bool,
    {
        loop {
            let mode = *self.rx.borrow_and_update();
            if predicate(mode) {
                return mode;
            }
            if self.rx.changed().await.is_err() {
                return *self.rx.borrow();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_uninitialized_and_uses_fallback() {
        let state = ConnectionState::new();
        assert_eq!(state.current(), BackendMode::Uninitialized);
        assert!(state.current().is_using_fallback());
    }

    #[test]
    fn test_watch_sees_transitions() {
        let state = ConnectionState::new();
        let watch = state.subscribe();

        assert!(state.transition(BackendMode::Connecting));
        assert!(state.transition(BackendMode::Connected));
        assert_eq!(watch.current(), BackendMode::Connected);
        assert!(watch.current().is_connected());

        assert!(!state.transition(BackendMode::Connected));
        assert!(state.transition(BackendMode::Fallback));
        assert!(watch.current().is_using_fallback());
    }

    #[test]
    fn test_closed_is_terminal() {
        let state = ConnectionState::new();
        state.transition(BackendMode::Connected);
        assert!(state.transition(BackendMode::Closed));
        assert!(!state.transition(BackendMode::Connected));
        assert_eq!(state.current(), BackendMode::Closed);
    }

    #[tokio::test]
    async fn test_wait_for_mode() {
        let state = ConnectionState::new();
        let mut watch = state.subscribe();

        let waiter = tokio::spawn(async move { watch.wait_for(|m| m.is_connected()).await });
        state.transition(BackendMode::Connecting);
        state.transition(BackendMode::Connected);

        assert_eq!(waiter.await.unwrap(), BackendMode::Connected);
    }

    #[test]
    fn test_mode_serializes_snake_case() {
        let json = serde_json::to_string(&BackendMode::Fallback).unwrap();
        assert_eq!(json, "\"fallback\"");
    }
}
