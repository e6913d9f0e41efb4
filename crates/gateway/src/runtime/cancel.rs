//! Per-thread cancellation tokens.
//!
//! Each in-flight run gets a `CancelToken` keyed by its thread.  The poll
//! loop waits on [`CancelToken::cancelled`] alongside its back-off sleep,
//! so a cancel takes effect without waiting out the interval.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cancellation signal shared between the map and one run.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Active tokens by thread key.
#[derive(Default)]
pub struct CancelMap {
    tokens: Mutex<HashMap<String, CancelToken>>,
}

impl CancelMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a fresh token for `key`.
    pub fn register(&self, key: &str) -> CancelToken {
        let token = CancelToken::new();
        self.tokens.lock().insert(key.to_owned(), token.clone());
        token
    }

    /// Cancel the run on `key`.  Returns true if one was registered.
    pub fn cancel(&self, key: &str) -> bool {
        match self.tokens.lock().get(key) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered run; returns how many were signalled.
    pub fn cancel_all(&self) -> usize {
        let tokens = self.tokens.lock();
        for token in tokens.values() {
            token.cancel();
        }
        tokens.len()
    }

    pub fn remove(&self, key: &str) {
        self.tokens.lock().remove(key);
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.tokens.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn register_cancel_remove() {
        let map = CancelMap::new();
        let token = map.register("C1:1.0");
        assert!(map.is_running("C1:1.0"));
        assert!(!token.is_cancelled());

        assert!(map.cancel("C1:1.0"));
        assert!(token.is_cancelled());

        map.remove("C1:1.0");
        assert!(!map.is_running("C1:1.0"));
        assert!(!map.cancel("C1:1.0"));
    }

    #[test]
    fn cancel_all_reaches_every_token() {
        let map = CancelMap::new();
        let a = map.register("a");
        let b = map.register("b");
        assert_eq!(map.cancel_all(), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_wakes_a_waiting_task() {
        let token = CancelToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter woke")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_returns_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .expect("already cancelled");
    }
}
