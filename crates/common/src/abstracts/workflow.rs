//! Abstract review state machine
//!
//! Every mutation of an abstract's lifecycle goes through [`apply`] or
//! [`record_review`], which check the actor's role and the current status
//! before touching the record.
//!
//! ```text
//! draft -> submitted -> under-review -> {approved|accepted, rejected, revision-requested}
//! revision-requested -> revised-pending-review -> under-review
//! approved|accepted -> proof uploaded -> proof verified -> final file uploaded
//! ```

use super::event::AbstractSettings;
use super::model::{Abstract, AbstractStatus, ReviewDecision, ReviewEntry, RevisionRequest};
use super::validation::AbstractInput;
use crate::auth::Role;
use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest score a reviewer may give
pub const MAX_REVIEW_SCORE: u8 = 10;

/// A lifecycle action on a single abstract
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Registrant/author submits a draft or a revised version
    Submit,
    /// Admin opens review on a submitted abstract
    StartReview,
    /// Admin records a decision (`approved`, `accepted` or `rejected`)
    Decide {
        status: AbstractStatus,
        reason: Option<String>,
    },
    /// Admin asks the submitter for changes
    RequestRevision {
        instructions: String,
        deadline: Option<DateTime<Utc>>,
    },
    /// Admin override used by the status endpoint and bulk actions
    SetStatus {
        status: AbstractStatus,
        reason: Option<String>,
    },
    UploadRegistrationProof { url: String },
    VerifyRegistration,
    UploadFinalFile { url: String },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Submit => "submit",
            Action::StartReview => "start review on",
            Action::Decide { .. } => "decide",
            Action::RequestRevision { .. } => "request revision on",
            Action::SetStatus { .. } => "set status on",
            Action::UploadRegistrationProof { .. } => "upload registration proof for",
            Action::VerifyRegistration => "verify registration for",
            Action::UploadFinalFile { .. } => "upload the final file for",
        }
    }
}

fn require_staff(role: Role, action: &Action) -> Result<()> {
    if role.is_staff() {
        Ok(())
    } else {
        Err(AppError::InsufficientRole {
            role: role.to_string(),
            action: action.name().to_string(),
        })
    }
}

fn require_submitter(role: Role, action: &Action) -> Result<()> {
    if role.is_submitter() {
        Ok(())
    } else {
        Err(AppError::InsufficientRole {
            role: role.to_string(),
            action: action.name().to_string(),
        })
    }
}

fn non_blank(value: &str, field: &str, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::Validation {
            message: message.to_string(),
            field: Some(field.to_string()),
        })
    } else {
        Ok(trimmed.to_string())
    }
}

fn clean_reason(reason: Option<String>) -> Option<String> {
    reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

/// Apply `action` performed by an actor holding `role`.
///
/// Returns the status the abstract ends in. On error the record is left
/// untouched.
pub fn apply(
    record: &mut Abstract,
    action: Action,
    role: Role,
    now: DateTime<Utc>,
) -> Result<AbstractStatus> {
    let from = record.status;

    match action {
        Action::Submit => {
            require_submitter(role, &action)?;
            record.status = match from {
                AbstractStatus::Draft => AbstractStatus::Submitted,
                AbstractStatus::RevisionRequested => AbstractStatus::RevisedPendingReview,
                _ => return Err(AppError::transition(from, action.name())),
            };
        }
        Action::StartReview => {
            require_staff(role, &action)?;
            if !from.awaits_review() {
                return Err(AppError::transition(from, action.name()));
            }
            record.status = AbstractStatus::UnderReview;
        }
        Action::Decide { status, ref reason } => {
            require_staff(role, &action)?;
            if !status.is_terminal() {
                return Err(AppError::Validation {
                    message: format!("{} is not a decision", status),
                    field: Some("status".to_string()),
                });
            }
            if from == AbstractStatus::Draft {
                return Err(AppError::transition(from, action.name()));
            }
            record.decision_reason = clean_reason(reason.clone());
            record.status = status;
        }
        Action::RequestRevision {
            ref instructions,
            deadline,
        } => {
            require_staff(role, &action)?;
            let instructions = non_blank(
                instructions,
                "instructions",
                "Revision instructions are required",
            )?;
            if from == AbstractStatus::Draft {
                return Err(AppError::transition(from, action.name()));
            }
            record.revision = Some(RevisionRequest {
                instructions,
                deadline,
                requested_at: now,
            });
            record.status = AbstractStatus::RevisionRequested;
        }
        Action::SetStatus { status, reason } => {
            require_staff(role, &Action::SetStatus { status, reason: None })?;
            if let Some(reason) = clean_reason(reason) {
                record.decision_reason = Some(reason);
            }
            record.status = status;
        }
        Action::UploadRegistrationProof { ref url } => {
            require_submitter(role, &action)?;
            if !from.is_accepted() {
                return Err(AppError::transition(from, action.name()));
            }
            let url = non_blank(url, "url", "Registration proof file is required")?;
            record.registration_proof_url = Some(url);
            // A new proof needs a fresh verification
            record.registration_verified = false;
        }
        Action::VerifyRegistration => {
            require_staff(role, &action)?;
            if !record.has_registration_proof() {
                return Err(AppError::Conflict {
                    message: "No registration proof has been uploaded".to_string(),
                });
            }
            record.registration_verified = true;
        }
        Action::UploadFinalFile { ref url } => {
            require_submitter(role, &action)?;
            if !record.registration_verified {
                return Err(AppError::Conflict {
                    message: "Registration must be verified before uploading the final file"
                        .to_string(),
                });
            }
            let url = non_blank(url, "url", "Final file is required")?;
            record.final_file_url = Some(url);
        }
    }

    record.updated_at = now;
    if record.status != from {
        tracing::debug!(
            abstract_id = %record.id,
            from = %from,
            to = %record.status,
            "Abstract status changed"
        );
    }
    Ok(record.status)
}

/// A reviewer's decision payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    pub decision: ReviewDecision,
    pub score: u8,
    #[serde(default)]
    pub comments: String,
}

/// Whether a review was added or replaced an earlier one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewUpsert {
    Inserted,
    Updated,
}

/// Record `reviewer_id`'s review. A reviewer has at most one entry per
/// abstract; resubmitting replaces it in place.
pub fn record_review(
    record: &mut Abstract,
    reviewer_id: &str,
    input: ReviewInput,
    now: DateTime<Utc>,
) -> Result<ReviewUpsert> {
    if !record.is_assigned(reviewer_id) {
        return Err(AppError::Forbidden {
            message: "Reviewer is not assigned to this abstract".to_string(),
        });
    }
    if input.score > MAX_REVIEW_SCORE {
        return Err(AppError::Validation {
            message: format!("Score must be between 0 and {}", MAX_REVIEW_SCORE),
            field: Some("score".to_string()),
        });
    }

    let entry = ReviewEntry {
        reviewer: reviewer_id.to_string(),
        decision: input.decision,
        score: input.score,
        comments: input.comments.trim().to_string(),
        reviewed_at: now,
    };

    let outcome = match record.reviews.iter_mut().find(|r| r.reviewer == reviewer_id) {
        Some(existing) => {
            *existing = entry;
            ReviewUpsert::Updated
        }
        None => {
            record.reviews.push(entry);
            ReviewUpsert::Inserted
        }
    };
    record.updated_at = now;
    Ok(outcome)
}

/// Check that the submitter may edit `record` now. Drafts are held to the
/// submission window; submitted abstracts and requested revisions are not.
pub fn ensure_editable(
    record: &Abstract,
    settings: &AbstractSettings,
    now: DateTime<Utc>,
) -> Result<()> {
    match record.status {
        AbstractStatus::Draft => settings.ensure_accepting(now),
        AbstractStatus::Submitted | AbstractStatus::RevisionRequested => Ok(()),
        other => Err(AppError::transition(other, "edit")),
    }
}

/// Copy a validated edit into `record`. Unless saved as a draft, a draft
/// or a requested revision is submitted.
pub fn apply_edit(
    record: &mut Abstract,
    input: AbstractInput,
    draft: bool,
    role: Role,
    now: DateTime<Utc>,
) -> Result<AbstractStatus> {
    record.title = input.title;
    record.authors = input.authors;
    record.author_affiliations = input.author_affiliations;
    record.content = input.content;
    record.category = input.category;
    record.sub_topic = input.sub_topic;
    record.file = input.file;
    record.updated_at = now;

    if !draft
        && matches!(
            record.status,
            AbstractStatus::Draft | AbstractStatus::RevisionRequested
        )
    {
        apply(record, Action::Submit, role, now)?;
    }
    Ok(record.status)
}
