use std::fmt;

use tb_domain::error::Error;

/// Operations restricted to the administrative channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictedAction {
    ListTickets,
    UpdateStatus,
}

impl fmt::Display for RestrictedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RestrictedAction::ListTickets => "see the Tickets",
            RestrictedAction::UpdateStatus => "update the status of Tickets",
        })
    }
}

/// Which table request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStep {
    Create,
    List,
    Lookup,
    Update,
}

impl fmt::Display for StoreStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StoreStep::Create => "create new Ticket",
            StoreStep::List => "fetch Tickets",
            StoreStep::Lookup => "retrieve record",
            StoreStep::Update => "update ticket",
        })
    }
}

/// Tool-level failures.  The `Display` text is handed back to the
/// assistant verbatim as the tool output.
#[derive(thiserror::Error, Debug)]
pub enum DeskError {
    #[error("You are not Authorized for this only HR personal can {0}")]
    Unauthorized(RestrictedAction),

    #[error("No Ticket found with the given title.")]
    NotFound,

    #[error("Failed to {step}: {body}")]
    StoreRequestFailed { step: StoreStep, body: String },

    #[error("Failed to update ticket: the table answered for record {got}, expected {expected}; no change was confirmed")]
    Conflict { expected: String, got: String },
}

impl DeskError {
    /// Wrap a store error, keeping a rejected response body verbatim.
    pub fn store(step: StoreStep, err: Error) -> Self {
        let body = match err {
            Error::Store(body) => body,
            other => other.to_string(),
        };
        DeskError::StoreRequestFailed { step, body }
    }
}
