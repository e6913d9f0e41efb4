//! Inbound delivery de-duplication.
//!
//! Slack redelivers events it thinks timed out, and a mention in a
//! channel arrives both as `message` and `app_mention`.  Both copies
//! share `{channel}:{ts}`, which is remembered here for a fixed TTL.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub struct DeliveryDedupe {
    ttl: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl DeliveryDedupe {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Record `key`; true only for its first sighting within the TTL.
    pub fn first_seen(&self, key: &str) -> bool {
        self.first_seen_at(key, Instant::now())
    }

    fn first_seen_at(&self, key: &str, now: Instant) -> bool {
        let mut seen = self.seen.lock();
        match seen.get(key) {
            Some(at) if now.duration_since(*at) < self.ttl => false,
            _ => {
                seen.insert(key.to_owned(), now);
                true
            }
        }
    }

    /// Forget keys older than the TTL.  Returns how many were dropped.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut seen = self.seen.lock();
        let before = seen.len();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        before - seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }
}
