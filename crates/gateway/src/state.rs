use std::sync::Arc;

use tb_domain::config::Config;
use tb_sessions::ThreadMap;

use crate::runtime::dedupe::DeliveryDedupe;
use crate::runtime::SessionDriver;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub threads: Arc<ThreadMap>,
    pub driver: Arc<SessionDriver>,
    /// Drops redelivered Slack events.
    pub dedupe: Arc<DeliveryDedupe>,
    /// Slack app signing secret (resolved once at startup).
    pub signing_secret: Arc<str>,
}
