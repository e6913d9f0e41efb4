use async_trait::async_trait;

use tb_domain::notify::Notifier;
use tb_domain::trace::TraceEvent;

use crate::client::SlackClient;

/// [`Notifier`] over `chat.postMessage`.  Failures are logged and
/// recorded as `NotificationDropped`; the caller never sees them.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: SlackClient,
}

impl SlackNotifier {
    pub fn new(client: SlackClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post(&self, channel: &str, text: &str, thread_ts: Option<&str>) {
        if let Err(e) = self.client.post_message(channel, text, thread_ts).await {
            tracing::warn!(channel, error = %e, "notification dropped");
            TraceEvent::NotificationDropped {
                channel: channel.to_owned(),
                reason: e.to_string(),
            }
            .emit();
        }
    }
}
