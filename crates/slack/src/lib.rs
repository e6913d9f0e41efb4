//! `tb-slack`: the chat side of ticketbridge.
//!
//! - [`SlackClient`]: the two Web API methods we need
//!   (`chat.postMessage`, `users.info`).
//! - [`signature`]: `X-Slack-Signature` verification with a replay window.
//! - [`events`]: Events API envelopes and the message filter.
//! - [`SlackNotifier`]: best-effort [`tb_domain::notify::Notifier`].

pub mod client;
pub mod events;
pub mod notifier;
pub mod signature;

pub use client::SlackClient;
pub use events::{EventEnvelope, MessageEvent};
pub use notifier::SlackNotifier;
pub use signature::{verify_request, SignatureError};
