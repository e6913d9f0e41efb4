//! `tb-tickets`: the ticket table and the rules around it.
//!
//! [`AirtableStore`] speaks the table's REST dialect behind the
//! [`TableStore`] seam.  [`TicketDesk`] layers the HR rules on top:
//! who may list or close tickets, the admin notification on create, the
//! progress notices, and the serialized read-then-write status update.

pub mod desk;
pub mod error;
pub mod formula;
pub mod store;

pub use desk::{Caller, TicketDesk};
pub use error::{DeskError, RestrictedAction, StoreStep};
pub use store::{AirtableStore, TableRecord, TableStore};
