//! Request and response bodies shared by the gateway and the client

use super::assignment::{AssignmentMode, PairOutcome};
use super::model::{AbstractStatus, FileRef};
use super::validation::AbstractInput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Create/update payload. `draft` keeps the abstract out of review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAbstractRequest {
    #[serde(flatten)]
    pub input: AbstractInput,
    #[serde(default)]
    pub draft: bool,
}

/// Body of `PUT .../status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: AbstractStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionInput {
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
}

/// Body of the file, registration-proof and final-file uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInput {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl AttachmentInput {
    /// Falls back to the last path segment of the URL for the display name
    pub fn into_file_ref(self) -> FileRef {
        let name = self.name.unwrap_or_else(|| {
            self.url
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        });
        FileRef {
            url: self.url,
            name,
            size: self.size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    pub abstract_ids: Vec<String>,
    pub reviewer_ids: Vec<String>,
    #[serde(default)]
    pub replace: bool,
}

impl AssignmentRequest {
    pub fn mode(&self) -> AssignmentMode {
        AssignmentMode::from_replace_flag(self.replace)
    }
}

/// Status of an abstract after assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedAbstract {
    pub id: String,
    pub status: AbstractStatus,
    pub reviewer_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentReport {
    pub pairs: Vec<PairOutcome>,
    #[serde(default)]
    pub abstracts: Vec<AssignedAbstract>,
}

impl AssignmentReport {
    pub fn success(&self) -> bool {
        self.pairs.iter().all(|p| p.success)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignReport {
    pub assigned_abstracts: usize,
    pub skipped_abstracts: usize,
    pub new_assignments: usize,
}
