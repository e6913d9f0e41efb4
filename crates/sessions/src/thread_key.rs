//! Thread key computation.
//!
//! A conversation is identified by the channel it lives in plus the `ts`
//! of its root message: `<channel>:<thread_ts>`.  Top-level messages that
//! are not replies start their own thread, so their own `ts` is the root.

use std::fmt;

/// Stable key of one chat thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadKey(String);

impl ThreadKey {
    /// Build the key for a message in `channel` with timestamp `ts`,
    /// replying in `thread_ts` when it is part of an existing thread.
    pub fn for_message(channel: &str, ts: &str, thread_ts: Option<&str>) -> Self {
        let root = thread_ts.filter(|t| !t.is_empty()).unwrap_or(ts);
        Self(format!("{channel}:{root}"))
    }

    /// The root message timestamp (what replies are posted under).
    pub fn thread_ts(&self) -> &str {
        self.0
            .split_once(':')
            .map(|(_, ts)| ts)
            .unwrap_or(self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
