//! Events API payloads.
//!
//! Only the envelope shapes we act on are modelled.  Anything else
//! deserializes to [`EventEnvelope::Other`] and is acknowledged without
//! further work.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    /// Endpoint ownership check sent when the request URL is configured.
    UrlVerification { challenge: String },
    EventCallback {
        #[serde(default)]
        event_id: Option<String>,
        event: InnerEvent,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InnerEvent {
    Message(MessageEvent),
    AppMention(MessageEvent),
    #[serde(other)]
    Other,
}

/// The fields shared by `message` and `app_mention` events.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageEvent {
    pub channel: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

impl MessageEvent {
    /// A message a person typed: not bot-authored, no subtype
    /// (edits, joins, deletions), has an author and some text.
    pub fn is_actionable(&self) -> bool {
        self.bot_id.is_none()
            && self.subtype.is_none()
            && self.user.as_deref().is_some_and(|u| !u.is_empty())
            && !self.text.trim().is_empty()
    }

    /// Key used to drop redelivered copies of the same message.
    pub fn delivery_key(&self) -> String {
        format!("{}:{}", self.channel, self.ts)
    }
}

impl EventEnvelope {
    /// The message carried by a `message` or `app_mention` callback.
    pub fn message(&self) -> Option<&MessageEvent> {
        match self {
            EventEnvelope::EventCallback {
                event: InnerEvent::Message(m) | InnerEvent::AppMention(m),
                ..
            } => Some(m),
            _ => None,
        }
    }
}
