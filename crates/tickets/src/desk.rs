//! HR ticket desk: the three ticket actions with their access rules and
//! side effects.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tokio::sync::Mutex;

use tb_domain::notify::Notifier;
use tb_domain::ticket::{NewTicket, Ticket, TicketStatus};

use crate::error::{DeskError, RestrictedAction, StoreStep};
use crate::formula;
use crate::store::{
    TableStore, FIELD_CREATED_BY, FIELD_DETAILS, FIELD_PRIORITY, FIELD_STATUS, FIELD_TITLE,
};

pub const NOTICE_FETCHING: &str = "fetching Pending Tickets...";
pub const NOTICE_UPDATING: &str = "Updating the Ticket...";

/// Where a tool call came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub channel: String,
    /// Thread the progress notices are posted into.
    pub thread_ts: Option<String>,
}

impl Caller {
    pub fn new(channel: impl Into<String>, thread_ts: Option<String>) -> Self {
        Self {
            channel: channel.into(),
            thread_ts,
        }
    }
}

pub struct TicketDesk {
    store: Arc<dyn TableStore>,
    notifier: Arc<dyn Notifier>,
    admin_channel: String,
    /// Held across the lookup and the patch of a status update.
    writer: Mutex<()>,
}

impl TicketDesk {
    pub fn new(
        store: Arc<dyn TableStore>,
        notifier: Arc<dyn Notifier>,
        admin_channel: impl Into<String>,
    ) -> Self {
        Self {
            store,
            notifier,
            admin_channel: admin_channel.into(),
            writer: Mutex::new(()),
        }
    }

    fn is_admin(&self, caller: &Caller) -> bool {
        caller.channel == self.admin_channel
    }

    async fn notice(&self, caller: &Caller, text: &str) {
        self.notifier
            .post(&caller.channel, text, caller.thread_ts.as_deref())
            .await;
    }

    /// Create a Pending ticket and tell the admin channel about it.
    pub async fn create_ticket(
        &self,
        ticket: &NewTicket,
        created_by: &str,
    ) -> Result<Ticket, DeskError> {
        let mut fields = Map::new();
        fields.insert(FIELD_TITLE.into(), json!(ticket.title));
        fields.insert(FIELD_DETAILS.into(), json!(ticket.details));
        fields.insert(FIELD_PRIORITY.into(), json!(ticket.priority.as_str()));
        fields.insert(FIELD_CREATED_BY.into(), json!(created_by));
        fields.insert(FIELD_STATUS.into(), json!(TicketStatus::Pending.as_str()));

        let record = self
            .store
            .create_record(fields)
            .await
            .map_err(|e| DeskError::store(StoreStep::Create, e))?;

        tracing::info!(record_id = %record.id, title = %ticket.title, "ticket created");

        self.notifier
            .post(&self.admin_channel, &admin_notice(ticket, created_by), None)
            .await;

        Ok(record.to_ticket())
    }

    /// Every Pending ticket.  Admin channel only; other callers get
    /// `Unauthorized` without the table being touched.
    pub async fn list_pending(&self, caller: &Caller) -> Result<Vec<Ticket>, DeskError> {
        if !self.is_admin(caller) {
            return Err(DeskError::Unauthorized(RestrictedAction::ListTickets));
        }
        self.notice(caller, NOTICE_FETCHING).await;

        let records = self
            .store
            .list_records(&formula::pending(), None)
            .await
            .map_err(|e| DeskError::store(StoreStep::List, e))?;
        Ok(records.iter().map(|r| r.to_ticket()).collect())
    }

    /// Mark the first Pending ticket titled `title` as Done.
    ///
    /// Makes one lookup and at most one patch, under the desk's writer
    /// lock.  The patch response must echo the looked-up record id and
    /// title, otherwise the update is reported as a conflict.
    pub async fn update_status(&self, title: &str, caller: &Caller) -> Result<String, DeskError> {
        if !self.is_admin(caller) {
            return Err(DeskError::Unauthorized(RestrictedAction::UpdateStatus));
        }

        let _guard = self.writer.lock().await;

        let found = self
            .store
            .list_records(&formula::pending_with_title(title), Some(1))
            .await
            .map_err(|e| DeskError::store(StoreStep::Lookup, e))?;
        let Some(target) = found.into_iter().next() else {
            return Err(DeskError::NotFound);
        };

        self.notice(caller, NOTICE_UPDATING).await;

        let mut fields = Map::new();
        fields.insert(FIELD_STATUS.into(), Value::from(TicketStatus::Done.as_str()));
        let written = self
            .store
            .update_record(&target.id, fields)
            .await
            .map_err(|e| DeskError::store(StoreStep::Update, e))?;

        if written.id != target.id || written.text(FIELD_TITLE) != target.text(FIELD_TITLE) {
            tracing::error!(
                expected = %target.id,
                got = %written.id,
                "status update answered for a different record"
            );
            return Err(DeskError::Conflict {
                expected: target.id,
                got: written.id,
            });
        }

        tracing::info!(record_id = %target.id, title, "ticket marked done");
        Ok(format!(
            "Ticket Status of {title} has been Successfully updated to Done"
        ))
    }
}

/// Text posted to the admin channel for a new ticket.
pub fn admin_notice(ticket: &NewTicket, created_by: &str) -> String {
    format!(
        "There is a new ticket '\"{}\"' created by \"{}\" with details: \"{}\" and its priority is \"{}\".",
        ticket.title, created_by, ticket.details, ticket.priority
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
