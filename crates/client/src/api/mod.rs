//! Abstract repository access
//!
//! [`AbstractApi`] is the single seam between the workflow code and the
//! REST backend. [`HttpAbstractApi`] talks to the gateway and normalizes
//! every response into one shape; [`MockAbstractApi`] keeps records in
//! memory for tests.

mod http;
mod mock;

pub use http::HttpAbstractApi;
pub use mock::MockAbstractApi;

use crate::errors::ClientResult;
use crate::session::Session;
use async_trait::async_trait;
use atlas_common::abstracts::{
    Abstract, AbstractSettings, AssignmentReport, AssignmentRequest, AttachmentInput,
    AutoAssignReport, ReviewInput, RevisionInput, StatusChange, SubmitAbstractRequest,
};
use atlas_common::export::ExportFilters;
use atlas_common::listing::ListQuery;

/// Which list endpoint to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// The caller's own abstracts
    Own,
    /// Every abstract of the event (staff; reviewers see assigned ones)
    Event,
}

/// Upload endpoints that take a file reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Abstract,
    RegistrationProof,
    FinalFile,
}

impl AttachmentKind {
    pub fn path(&self) -> &'static str {
        match self {
            AttachmentKind::Abstract => "file",
            AttachmentKind::RegistrationProof => "registration-proof",
            AttachmentKind::FinalFile => "final-file",
        }
    }
}

/// A downloaded export artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// From `Content-Disposition`, when the server sent one
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait AbstractApi: Send + Sync {
    async fn list_abstracts(
        &self,
        session: &Session,
        event_id: &str,
        scope: ListScope,
        query: &ListQuery,
    ) -> ClientResult<Vec<Abstract>>;

    async fn get_abstract(&self, session: &Session, event_id: &str, id: &str) -> ClientResult<Abstract>;

    async fn create_abstract(
        &self,
        session: &Session,
        event_id: &str,
        request: &SubmitAbstractRequest,
    ) -> ClientResult<Abstract>;

    async fn update_abstract(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        request: &SubmitAbstractRequest,
    ) -> ClientResult<Abstract>;

    async fn delete_abstract(&self, session: &Session, event_id: &str, id: &str) -> ClientResult<()>;

    async fn update_status(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        change: &StatusChange,
    ) -> ClientResult<Abstract>;

    async fn attach(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        kind: AttachmentKind,
        file: &AttachmentInput,
    ) -> ClientResult<Abstract>;

    async fn verify_registration(&self, session: &Session, event_id: &str, id: &str) -> ClientResult<Abstract>;

    async fn request_revision(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        revision: &RevisionInput,
    ) -> ClientResult<Abstract>;

    async fn submit_review(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        review: &ReviewInput,
    ) -> ClientResult<Abstract>;

    async fn assign_reviewers(
        &self,
        session: &Session,
        event_id: &str,
        request: &AssignmentRequest,
    ) -> ClientResult<AssignmentReport>;

    async fn auto_assign_reviewers(&self, session: &Session, event_id: &str) -> ClientResult<AutoAssignReport>;

    async fn get_settings(&self, session: &Session, event_id: &str) -> ClientResult<AbstractSettings>;

    async fn download(&self, session: &Session, event_id: &str, filters: &ExportFilters) -> ClientResult<Download>;

    /// Status updates a bulk run keeps in flight; 1 runs them in order
    fn bulk_concurrency(&self) -> usize {
        1
    }
}
