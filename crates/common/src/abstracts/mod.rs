//! Abstract submission domain
//!
//! - `model`: the abstract record and its status vocabulary
//! - `event`: per-event settings, categories and reviewer pools
//! - `validation`: field rules shared by client and gateway
//! - `workflow`: status transitions and review upserts
//! - `assignment`: manual and category-pool reviewer assignment
//! - `requests`: wire bodies for the REST contract

pub mod assignment;
pub mod event;
pub mod model;
pub mod requests;
pub mod validation;
pub mod workflow;

pub use assignment::{AssignmentMode, PairOutcome};
pub use event::{AbstractSettings, Category, SubTopic, SubmissionWindow};
pub use model::{
    Abstract, AbstractStatus, FileRef, FinalStatus, Owner, RegistrantSummary, ReviewDecision,
    ReviewEntry, RevisionRequest,
};
pub use requests::{
    AssignedAbstract, AssignmentReport, AssignmentRequest, AttachmentInput, AutoAssignReport,
    RevisionInput, StatusChange, SubmitAbstractRequest,
};
pub use validation::{prepare_submission, AbstractInput};
pub use workflow::{
    apply, apply_edit, ensure_editable, record_review, Action, ReviewInput, ReviewUpsert,
};
