//! Abstract record and its lifecycle vocabulary

use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Lifecycle status. An abstract holds exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbstractStatus {
    Draft,
    Submitted,
    UnderReview,
    Approved,
    Accepted,
    Rejected,
    RevisionRequested,
    Pending,
    RevisedPendingReview,
}

impl AbstractStatus {
    pub const ALL: [AbstractStatus; 9] = [
        AbstractStatus::Draft,
        AbstractStatus::Submitted,
        AbstractStatus::UnderReview,
        AbstractStatus::Approved,
        AbstractStatus::Accepted,
        AbstractStatus::Rejected,
        AbstractStatus::RevisionRequested,
        AbstractStatus::Pending,
        AbstractStatus::RevisedPendingReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AbstractStatus::Draft => "draft",
            AbstractStatus::Submitted => "submitted",
            AbstractStatus::UnderReview => "under-review",
            AbstractStatus::Approved => "approved",
            AbstractStatus::Accepted => "accepted",
            AbstractStatus::Rejected => "rejected",
            AbstractStatus::RevisionRequested => "revision-requested",
            AbstractStatus::Pending => "pending",
            AbstractStatus::RevisedPendingReview => "revised-pending-review",
        }
    }

    /// `approved` and `accepted` are synonyms for a positive decision
    pub fn is_accepted(&self) -> bool {
        matches!(self, AbstractStatus::Approved | AbstractStatus::Accepted)
    }

    pub fn is_terminal(&self) -> bool {
        self.is_accepted() || *self == AbstractStatus::Rejected
    }

    /// Statuses from which an admin can open the review
    pub fn awaits_review(&self) -> bool {
        matches!(
            self,
            AbstractStatus::Submitted | AbstractStatus::Pending | AbstractStatus::RevisedPendingReview
        )
    }
}

impl fmt::Display for AbstractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbstractStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbstractStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| AppError::InvalidFormat {
                message: format!("Unknown abstract status: {}", s),
            })
    }
}

/// A reviewer's recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewDecision {
    Accept,
    Reject,
    Revise,
    Undecided,
}

/// One reviewer's recorded review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub reviewer: String,
    pub decision: ReviewDecision,
    pub score: u8,
    #[serde(default)]
    pub comments: String,
    pub reviewed_at: DateTime<Utc>,
}

/// Who submitted the abstract. The two channels are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "kebab-case")]
pub enum Owner {
    /// Submitted under a registration-ID session
    Registration(String),
    /// Submitted by an email/password author account
    Author(String),
}

impl Owner {
    pub fn id(&self) -> &str {
        match self {
            Owner::Registration(id) | Owner::Author(id) => id,
        }
    }
}

/// Denormalized registrant details used by search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrantSummary {
    #[serde(default)]
    pub registration_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Reference to an uploaded artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Admin revision request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionRequest {
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    pub requested_at: DateTime<Utc>,
}

/// Where an accepted abstract stands on the proof/final-file track.
/// Derived from the stored fields, never stored itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalStatus {
    NotRequired,
    ProofPending,
    ProofSubmitted,
    ProofVerified,
    FinalUploaded,
}

/// A conference abstract submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Abstract {
    pub id: String,
    pub event_id: String,
    #[serde(default)]
    pub abstract_number: Option<u32>,

    pub title: String,
    pub authors: String,
    #[serde(default)]
    pub author_affiliations: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_topic: Option<String>,
    #[serde(default)]
    pub file: Option<FileRef>,

    pub owner: Owner,
    #[serde(default)]
    pub registrant: Option<RegistrantSummary>,

    pub status: AbstractStatus,
    #[serde(default)]
    pub assigned_reviewers: BTreeSet<String>,
    #[serde(default)]
    pub reviews: Vec<ReviewEntry>,
    #[serde(default)]
    pub revision: Option<RevisionRequest>,
    #[serde(default)]
    pub decision_reason: Option<String>,

    #[serde(default)]
    pub registration_proof_url: Option<String>,
    #[serde(default)]
    pub registration_verified: bool,
    #[serde(default)]
    pub final_file_url: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Abstract {
    pub fn is_assigned(&self, reviewer_id: &str) -> bool {
        self.assigned_reviewers.contains(reviewer_id)
    }

    pub fn review_by(&self, reviewer_id: &str) -> Option<&ReviewEntry> {
        self.reviews.iter().find(|r| r.reviewer == reviewer_id)
    }

    /// Mean review score, `None` before the first review
    pub fn average_score(&self) -> Option<f64> {
        if self.reviews.is_empty() {
            return None;
        }
        let total: u32 = self.reviews.iter().map(|r| u32::from(r.score)).sum();
        Some(f64::from(total) / self.reviews.len() as f64)
    }

    pub fn has_registration_proof(&self) -> bool {
        self.registration_proof_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn has_final_file(&self) -> bool {
        self.final_file_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn final_status(&self) -> FinalStatus {
        if !self.status.is_accepted() {
            FinalStatus::NotRequired
        } else if self.has_final_file() {
            FinalStatus::FinalUploaded
        } else if self.registration_verified {
            FinalStatus::ProofVerified
        } else if self.has_registration_proof() {
            FinalStatus::ProofSubmitted
        } else {
            FinalStatus::ProofPending
        }
    }

    /// Whether `user_id` submitted this abstract
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner.id() == user_id
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in AbstractStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
            assert_eq!(status.as_str().parse::<AbstractStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("in-review".parse::<AbstractStatus>().is_err());
        assert!(serde_json::from_str::<AbstractStatus>("\"archived\"").is_err());
    }

    #[test]
    fn owner_serializes_as_tagged() {
        let owner = Owner::Author("auth-9".into());
        let json = serde_json::to_value(&owner).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "author", "id": "auth-9"}));
    }

    #[test]
    fn final_status_follows_proof_track() {
        let mut record = sample("a1", AbstractStatus::UnderReview);
        assert_eq!(record.final_status(), FinalStatus::NotRequired);

        record.status = AbstractStatus::Accepted;
        assert_eq!(record.final_status(), FinalStatus::ProofPending);

        record.registration_proof_url = Some("https://files/proof.pdf".into());
        assert_eq!(record.final_status(), FinalStatus::ProofSubmitted);

        record.registration_verified = true;
        assert_eq!(record.final_status(), FinalStatus::ProofVerified);

        record.final_file_url = Some("https://files/final.pdf".into());
        assert_eq!(record.final_status(), FinalStatus::FinalUploaded);
    }

    #[test]
    fn average_score_over_reviews() {
        let mut record = sample("a1", AbstractStatus::UnderReview);
        assert_eq!(record.average_score(), None);

        for (reviewer, score) in [("r1", 6), ("r2", 9)] {
            record.reviews.push(ReviewEntry {
                reviewer: reviewer.into(),
                decision: ReviewDecision::Accept,
                score,
                comments: String::new(),
                reviewed_at: at(2),
            });
        }
        assert_eq!(record.average_score(), Some(7.5));
    }
}
