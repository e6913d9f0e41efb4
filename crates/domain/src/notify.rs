use async_trait::async_trait;

/// Best-effort sink for chat notifications.
///
/// Implementations log and swallow their own failures; callers never
/// learn whether a post went through.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `text` into `channel`, optionally as a reply in `thread_ts`.
    async fn post(&self, channel: &str, text: &str, thread_ts: Option<&str>);
}
