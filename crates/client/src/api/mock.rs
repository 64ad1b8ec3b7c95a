//! In-memory `AbstractApi` for tests
//!
//! Applies the same domain rules as the gateway, with switches to inject
//! per-abstract failures, transport outages and export replies.

use super::{AbstractApi, AttachmentKind, Download, ListScope};
use crate::errors::{ClientError, ClientResult};
use crate::session::Session;
use async_trait::async_trait;
use atlas_common::abstracts::{
    self, assignment, prepare_submission, Abstract, AbstractSettings, AbstractStatus,
    AssignedAbstract, AssignmentReport, AssignmentRequest, AttachmentInput, AutoAssignReport,
    Owner, ReviewInput, RevisionInput, StatusChange, SubmitAbstractRequest,
};
use atlas_common::auth::Role;
use atlas_common::export::ExportFilters;
use atlas_common::listing::ListQuery;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Canned reply for `download`
#[derive(Debug, Clone)]
enum DownloadReply {
    Artifact(Download),
    Failure(String),
}

#[derive(Default)]
pub struct MockAbstractApi {
    records: Mutex<BTreeMap<String, Abstract>>,
    settings: Mutex<AbstractSettings>,
    status_failures: Mutex<HashMap<String, String>>,
    assign_failures: Mutex<HashMap<String, String>>,
    status_calls: Mutex<Vec<(String, AbstractStatus)>>,
    download: Mutex<Option<DownloadReply>>,
    offline: AtomicBool,
    next_id: AtomicU32,
    bulk_concurrency: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockAbstractApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abstracts(self, records: impl IntoIterator<Item = Abstract>) -> Self {
        {
            let mut stored = lock(&self.records);
            for record in records {
                stored.insert(record.id.clone(), record);
            }
        }
        self
    }

    pub fn with_settings(self, settings: AbstractSettings) -> Self {
        *lock(&self.settings) = settings;
        self
    }

    pub fn with_bulk_concurrency(self, concurrency: usize) -> Self {
        self.bulk_concurrency.store(concurrency, Ordering::SeqCst);
        self
    }

    /// Status updates for `id` fail with `message`
    pub fn fail_status_update(&self, id: &str, message: &str) {
        lock(&self.status_failures).insert(id.to_string(), message.to_string());
    }

    /// Reviewer assignment pairs on `id` fail with `message`
    pub fn fail_assignment(&self, id: &str, message: &str) {
        lock(&self.assign_failures).insert(id.to_string(), message.to_string());
    }

    /// Every call fails with a transport error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_download(&self, download: Download) {
        *lock(&self.download) = Some(DownloadReply::Artifact(download));
    }

    pub fn fail_download(&self, message: &str) {
        *lock(&self.download) = Some(DownloadReply::Failure(message.to_string()));
    }

    pub fn record(&self, id: &str) -> Option<Abstract> {
        lock(&self.records).get(id).cloned()
    }

    /// `(id, target)` for every status update received, in order
    pub fn status_calls(&self) -> Vec<(String, AbstractStatus)> {
        lock(&self.status_calls).clone()
    }

    fn online(&self) -> ClientResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(ClientError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn not_found(id: &str) -> ClientError {
        ClientError::Server {
            status: Some(404),
            message: format!("Abstract not found: {}", id),
        }
    }

    /// Run `f` on a stored record and keep the change only on success
    fn mutate<F>(&self, event_id: &str, id: &str, f: F) -> ClientResult<Abstract>
    where
        F: FnOnce(&mut Abstract) -> ClientResult<()>,
    {
        self.online()?;
        let mut records = lock(&self.records);
        let stored = records
            .get_mut(id)
            .filter(|r| r.event_id == event_id)
            .ok_or_else(|| Self::not_found(id))?;
        let mut draft = stored.clone();
        f(&mut draft)?;
        *stored = draft.clone();
        Ok(draft)
    }
}

#[async_trait]
impl AbstractApi for MockAbstractApi {
    async fn list_abstracts(
        &self,
        session: &Session,
        event_id: &str,
        scope: ListScope,
        _query: &ListQuery,
    ) -> ClientResult<Vec<Abstract>> {
        self.online()?;
        let records = lock(&self.records);
        Ok(records
            .values()
            .filter(|r| r.event_id == event_id)
            .filter(|r| match (scope, session.user_id()) {
                (ListScope::Own, Some(user)) => r.is_owned_by(user),
                (ListScope::Own, None) => false,
                (ListScope::Event, Some(user)) if session.role() == Role::Reviewer => {
                    r.is_assigned(user)
                }
                (ListScope::Event, _) => true,
            })
            .cloned()
            .collect())
    }

    async fn get_abstract(&self, _session: &Session, event_id: &str, id: &str) -> ClientResult<Abstract> {
        self.online()?;
        lock(&self.records)
            .get(id)
            .filter(|r| r.event_id == event_id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn create_abstract(
        &self,
        session: &Session,
        event_id: &str,
        request: &SubmitAbstractRequest,
    ) -> ClientResult<Abstract> {
        self.online()?;
        let settings = lock(&self.settings).clone();
        let now = Utc::now();
        settings.ensure_accepting(now)?;
        let input = prepare_submission(request.input.clone(), &settings)?;

        let user = session.user_id().unwrap_or("anonymous").to_string();
        let owner = match session.role() {
            Role::Author => Owner::Author(user),
            _ => Owner::Registration(user),
        };
        let number = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        let record = Abstract {
            id: format!("abs-{}", number),
            event_id: event_id.to_string(),
            abstract_number: Some(number),
            title: input.title,
            authors: input.authors,
            author_affiliations: input.author_affiliations,
            content: input.content,
            category: input.category,
            sub_topic: input.sub_topic,
            file: input.file,
            owner,
            registrant: None,
            status: if request.draft {
                AbstractStatus::Draft
            } else {
                AbstractStatus::Submitted
            },
            assigned_reviewers: Default::default(),
            reviews: Vec::new(),
            revision: None,
            decision_reason: None,
            registration_proof_url: None,
            registration_verified: false,
            final_file_url: None,
            created_at: now,
            updated_at: now,
        };

        lock(&self.records).insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_abstract(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        request: &SubmitAbstractRequest,
    ) -> ClientResult<Abstract> {
        let settings = lock(&self.settings).clone();
        let role = session.role();
        let user = session.user_id().unwrap_or_default().to_string();

        self.mutate(event_id, id, |record| {
            if !role.is_submitter() || !record.is_owned_by(&user) {
                return Err(ClientError::Server {
                    status: Some(403),
                    message: "Only the submitter may edit this abstract".to_string(),
                });
            }
            let now = Utc::now();
            abstracts::ensure_editable(record, &settings, now)?;
            let input = prepare_submission(request.input.clone(), &settings)?;
            abstracts::apply_edit(record, input, request.draft, role, now)?;
            Ok(())
        })
    }

    async fn delete_abstract(&self, _session: &Session, event_id: &str, id: &str) -> ClientResult<()> {
        self.online()?;
        let mut records = lock(&self.records);
        match records.get(id) {
            Some(record) if record.event_id == event_id => {
                records.remove(id);
                Ok(())
            }
            _ => Err(Self::not_found(id)),
        }
    }

    async fn update_status(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        change: &StatusChange,
    ) -> ClientResult<Abstract> {
        self.online()?;
        lock(&self.status_calls).push((id.to_string(), change.status));

        if let Some(message) = lock(&self.status_failures).get(id).cloned() {
            return Err(ClientError::Server {
                status: Some(400),
                message,
            });
        }

        let action = abstracts::Action::SetStatus {
            status: change.status,
            reason: change.reason.clone(),
        };
        self.mutate(event_id, id, |record| {
            abstracts::apply(record, action, session.role(), Utc::now())?;
            Ok(())
        })
    }

    async fn attach(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        kind: AttachmentKind,
        file: &AttachmentInput,
    ) -> ClientResult<Abstract> {
        let role = session.role();
        let file = file.clone();
        self.mutate(event_id, id, |record| {
            let now = Utc::now();
            match kind {
                AttachmentKind::Abstract => record.file = Some(file.into_file_ref()),
                AttachmentKind::RegistrationProof => {
                    let action = abstracts::Action::UploadRegistrationProof { url: file.url };
                    abstracts::apply(record, action, role, now)?;
                }
                AttachmentKind::FinalFile => {
                    let action = abstracts::Action::UploadFinalFile { url: file.url };
                    abstracts::apply(record, action, role, now)?;
                }
            }
            Ok(())
        })
    }

    async fn verify_registration(&self, session: &Session, event_id: &str, id: &str) -> ClientResult<Abstract> {
        self.mutate(event_id, id, |record| {
            abstracts::apply(record, abstracts::Action::VerifyRegistration, session.role(), Utc::now())?;
            Ok(())
        })
    }

    async fn request_revision(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        revision: &RevisionInput,
    ) -> ClientResult<Abstract> {
        let action = abstracts::Action::RequestRevision {
            instructions: revision.instructions.clone(),
            deadline: revision.deadline,
        };
        self.mutate(event_id, id, |record| {
            abstracts::apply(record, action, session.role(), Utc::now())?;
            Ok(())
        })
    }

    async fn submit_review(
        &self,
        session: &Session,
        event_id: &str,
        id: &str,
        review: &ReviewInput,
    ) -> ClientResult<Abstract> {
        let reviewer = session.user_id().unwrap_or_default().to_string();
        let review = review.clone();
        self.mutate(event_id, id, |record| {
            abstracts::record_review(record, &reviewer, review, Utc::now())?;
            Ok(())
        })
    }

    async fn assign_reviewers(
        &self,
        _session: &Session,
        event_id: &str,
        request: &AssignmentRequest,
    ) -> ClientResult<AssignmentReport> {
        self.online()?;
        let failures = lock(&self.assign_failures).clone();
        let mut records = lock(&self.records);
        let mut report = AssignmentReport::default();

        for abstract_id in &request.abstract_ids {
            let record = records
                .get_mut(abstract_id)
                .filter(|r| r.event_id == event_id);

            match (record, failures.get(abstract_id)) {
                (Some(record), None) => {
                    report
                        .pairs
                        .extend(assignment::assign(record, &request.reviewer_ids, request.mode()));
                    report.abstracts.push(AssignedAbstract {
                        id: record.id.clone(),
                        status: record.status,
                        reviewer_count: record.assigned_reviewers.len(),
                    });
                }
                (record, failure) => {
                    let message = match (record, failure) {
                        (_, Some(message)) => message.clone(),
                        _ => format!("Abstract not found: {}", abstract_id),
                    };
                    report
                        .pairs
                        .extend(assignment::fail_pairs(abstract_id, &request.reviewer_ids, &message));
                }
            }
        }

        Ok(report)
    }

    async fn auto_assign_reviewers(&self, _session: &Session, event_id: &str) -> ClientResult<AutoAssignReport> {
        self.online()?;
        let settings = lock(&self.settings).clone();
        let mut records = lock(&self.records);
        let mut report = AutoAssignReport::default();

        for record in records.values_mut().filter(|r| r.event_id == event_id) {
            match assignment::auto_assign(record, &settings) {
                Some(pairs) => {
                    report.assigned_abstracts += 1;
                    report.new_assignments += pairs.iter().filter(|p| p.newly_assigned).count();
                }
                None => report.skipped_abstracts += 1,
            }
        }
        Ok(report)
    }

    async fn get_settings(&self, _session: &Session, _event_id: &str) -> ClientResult<AbstractSettings> {
        self.online()?;
        Ok(lock(&self.settings).clone())
    }

    async fn download(&self, _session: &Session, _event_id: &str, _filters: &ExportFilters) -> ClientResult<Download> {
        self.online()?;
        match lock(&self.download).clone() {
            Some(DownloadReply::Artifact(download)) => Ok(download),
            Some(DownloadReply::Failure(message)) => Err(ClientError::Server {
                status: Some(400),
                message,
            }),
            None => Err(ClientError::MalformedResponse(
                "export response carries no artifact".to_string(),
            )),
        }
    }

    fn bulk_concurrency(&self) -> usize {
        self.bulk_concurrency.load(Ordering::SeqCst).max(1)
    }
}
