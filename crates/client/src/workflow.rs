//! Single-abstract actions
//!
//! Each action runs the shared domain rules against the caller's copy of the
//! record before any request is sent, so a rejected action never reaches
//! the network. The server applies the same rules again.

use crate::api::{AbstractApi, AttachmentKind};
use crate::errors::{ClientError, ClientResult};
use crate::session::Session;
use atlas_common::abstracts::{
    self, prepare_submission, Abstract, AbstractInput, AbstractStatus, Action, AttachmentInput,
    ReviewInput, RevisionInput, StatusChange, SubmitAbstractRequest,
};
use atlas_common::abstracts::workflow::MAX_REVIEW_SCORE;
use atlas_common::auth::Role;
use atlas_common::errors::AppError;
use atlas_common::metrics;
use chrono::{DateTime, Utc};

/// Role failures from the shared rules carry the session's role
fn local_error(session: &Session, err: AppError) -> ClientError {
    match err {
        AppError::InsufficientRole { action, .. } => ClientError::Forbidden {
            role: session.role(),
            action,
        },
        other => ClientError::from(other),
    }
}

/// Dry-run `action` on a copy of `record`
fn precheck(session: &Session, record: &Abstract, action: Action) -> ClientResult<AbstractStatus> {
    let mut copy = record.clone();
    abstracts::apply(&mut copy, action, session.role(), Utc::now())
        .map_err(|err| local_error(session, err))
}

/// Create (`existing` is `None`) or update an abstract.
///
/// A draft skips the submission step but is validated all the same. New
/// abstracts and drafts need an open submission window; submitted
/// abstracts and requested revisions stay editable after it closes.
pub async fn save_abstract<A>(
    api: &A,
    session: &Session,
    event_id: &str,
    existing: Option<&str>,
    input: AbstractInput,
    draft: bool,
) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    if !session.role().is_submitter() {
        return Err(ClientError::Forbidden {
            role: session.role(),
            action: "submit abstracts".to_string(),
        });
    }

    let settings = api.get_settings(session, event_id).await?;
    let now = Utc::now();
    let open = match existing {
        Some(id) => {
            let record = api.get_abstract(session, event_id, id).await?;
            abstracts::ensure_editable(&record, &settings, now)
        }
        None => settings.ensure_accepting(now),
    };
    open.map_err(|err| local_error(session, err))?;
    let input = prepare_submission(input, &settings)?;

    let request = SubmitAbstractRequest { input, draft };
    let saved = match existing {
        Some(id) => api.update_abstract(session, event_id, id, &request).await?,
        None => api.create_abstract(session, event_id, &request).await?,
    };

    metrics::record_submission(saved.status.as_str());
    tracing::info!(
        event_id,
        abstract_id = %saved.id,
        status = %saved.status,
        draft,
        "Abstract saved"
    );
    Ok(saved)
}

/// Submit or resubmit the caller's review. Only reviewers review.
pub async fn submit_review<A>(
    api: &A,
    session: &Session,
    record: &Abstract,
    review: ReviewInput,
) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    if session.role() != Role::Reviewer {
        return Err(ClientError::Forbidden {
            role: session.role(),
            action: "review abstracts".to_string(),
        });
    }
    if review.score > MAX_REVIEW_SCORE {
        return Err(ClientError::validation(
            "score",
            &format!("Score must be between 0 and {}", MAX_REVIEW_SCORE),
        ));
    }
    if let Some(user) = session.user_id() {
        if !record.is_assigned(user) {
            return Err(ClientError::Forbidden {
                role: session.role(),
                action: "review an abstract you are not assigned to".to_string(),
            });
        }
    }

    let updated = api
        .submit_review(session, &record.event_id, &record.id, &review)
        .await?;
    let replaced = session
        .user_id()
        .is_some_and(|user| record.reviews.iter().any(|r| r.reviewer == user));
    metrics::record_review(replaced);
    Ok(updated)
}

/// Approve, accept or reject with an optional reason
pub async fn decide<A>(
    api: &A,
    session: &Session,
    record: &Abstract,
    status: AbstractStatus,
    reason: Option<String>,
) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    precheck(
        session,
        record,
        Action::Decide {
            status,
            reason: reason.clone(),
        },
    )?;
    change_status(api, session, record, StatusChange { status, reason }).await
}

/// Open review on a submitted, pending or revised abstract
pub async fn start_review<A>(api: &A, session: &Session, record: &Abstract) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    precheck(session, record, Action::StartReview)?;
    let change = StatusChange {
        status: AbstractStatus::UnderReview,
        reason: None,
    };
    change_status(api, session, record, change).await
}

async fn change_status<A>(
    api: &A,
    session: &Session,
    record: &Abstract,
    change: StatusChange,
) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    let updated = api
        .update_status(session, &record.event_id, &record.id, &change)
        .await?;
    metrics::record_transition(change.status.as_str());
    Ok(updated)
}

pub async fn request_revision<A>(
    api: &A,
    session: &Session,
    record: &Abstract,
    instructions: &str,
    deadline: Option<DateTime<Utc>>,
) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    precheck(
        session,
        record,
        Action::RequestRevision {
            instructions: instructions.to_string(),
            deadline,
        },
    )?;

    let revision = RevisionInput {
        instructions: instructions.trim().to_string(),
        deadline,
    };
    let updated = api
        .request_revision(session, &record.event_id, &record.id, &revision)
        .await?;
    metrics::record_transition(AbstractStatus::RevisionRequested.as_str());
    Ok(updated)
}

/// Attach a proof of registration to an accepted abstract. Verification
/// is reset until an admin verifies the new proof.
pub async fn upload_registration_proof<A>(
    api: &A,
    session: &Session,
    record: &Abstract,
    file: AttachmentInput,
) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    precheck(
        session,
        record,
        Action::UploadRegistrationProof {
            url: file.url.clone(),
        },
    )?;
    api.attach(
        session,
        &record.event_id,
        &record.id,
        AttachmentKind::RegistrationProof,
        &file,
    )
    .await
}

pub async fn verify_registration<A>(api: &A, session: &Session, record: &Abstract) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    precheck(session, record, Action::VerifyRegistration)?;
    api.verify_registration(session, &record.event_id, &record.id)
        .await
}

/// Only allowed once the registration proof has been verified
pub async fn upload_final_file<A>(
    api: &A,
    session: &Session,
    record: &Abstract,
    file: AttachmentInput,
) -> ClientResult<Abstract>
where
    A: AbstractApi + ?Sized,
{
    precheck(
        session,
        record,
        Action::UploadFinalFile {
            url: file.url.clone(),
        },
    )?;
    api.attach(
        session,
        &record.event_id,
        &record.id,
        AttachmentKind::FinalFile,
        &file,
    )
    .await
}
