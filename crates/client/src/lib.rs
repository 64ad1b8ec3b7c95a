//! Atlas Client
//!
//! Admin and portal side of the abstract review workflow: an explicit
//! [`Session`] per actor, the REST adapter behind [`AbstractApi`], and the
//! assignment, bulk, list and export operations built on top of it.

pub mod api;
pub mod assignment;
pub mod bulk;
pub mod errors;
pub mod export;
pub mod listing;
pub mod session;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{AbstractApi, HttpAbstractApi, MockAbstractApi};
pub use assignment::{assign_reviewers, auto_assign_reviewers, AssignmentResult};
pub use bulk::{bulk_transition, BulkResult};
pub use errors::{ClientError, ClientResult};
pub use export::{export_abstracts, ExportOutcome};
pub use listing::{AbstractListView, ViewChange};
pub use session::{Session, SessionStore};
