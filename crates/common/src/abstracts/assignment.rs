//! Reviewer assignment rules

use super::event::AbstractSettings;
use super::model::Abstract;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a reviewer list is combined with the abstract's current set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssignmentMode {
    /// Add the reviewers, keep everyone already assigned
    #[default]
    Union,
    /// The given reviewers become the whole set
    Replace,
}

impl AssignmentMode {
    pub fn from_replace_flag(replace: bool) -> Self {
        if replace {
            AssignmentMode::Replace
        } else {
            AssignmentMode::Union
        }
    }
}

/// Result of one (abstract, reviewer) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairOutcome {
    pub abstract_id: String,
    pub reviewer_id: String,
    pub success: bool,
    /// False when the reviewer was already on the abstract
    pub newly_assigned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PairOutcome {
    pub fn ok(abstract_id: &str, reviewer_id: &str, newly_assigned: bool) -> Self {
        Self {
            abstract_id: abstract_id.to_string(),
            reviewer_id: reviewer_id.to_string(),
            success: true,
            newly_assigned,
            message: None,
        }
    }

    pub fn failed(abstract_id: &str, reviewer_id: &str, message: impl Into<String>) -> Self {
        Self {
            abstract_id: abstract_id.to_string(),
            reviewer_id: reviewer_id.to_string(),
            success: false,
            newly_assigned: false,
            message: Some(message.into()),
        }
    }
}

/// Reject empty selections before anything is sent or stored
pub fn ensure_selection(abstract_ids: &[String], reviewer_ids: &[String]) -> Result<()> {
    if abstract_ids.iter().all(|id| id.trim().is_empty()) {
        return Err(AppError::Validation {
            message: "Select at least one abstract".to_string(),
            field: Some("abstractIds".to_string()),
        });
    }
    if reviewer_ids.iter().all(|id| id.trim().is_empty()) {
        return Err(AppError::Validation {
            message: "Select at least one reviewer".to_string(),
            field: Some("reviewerIds".to_string()),
        });
    }
    Ok(())
}

/// Trimmed, deduplicated reviewer ids; every pair report is built from this set
pub fn requested_reviewers(reviewer_ids: &[String]) -> BTreeSet<&str> {
    reviewer_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .collect()
}

/// One failed pair per requested reviewer of `abstract_id`
pub fn fail_pairs(abstract_id: &str, reviewer_ids: &[String], message: &str) -> Vec<PairOutcome> {
    requested_reviewers(reviewer_ids)
        .into_iter()
        .map(|reviewer| PairOutcome::failed(abstract_id, reviewer, message))
        .collect()
}

/// Assign `reviewer_ids` to `record` and report one outcome per reviewer.
///
/// Assigning someone already on the abstract succeeds without changes.
pub fn assign(record: &mut Abstract, reviewer_ids: &[String], mode: AssignmentMode) -> Vec<PairOutcome> {
    let requested = requested_reviewers(reviewer_ids);

    let outcomes: Vec<PairOutcome> = requested
        .iter()
        .map(|reviewer| PairOutcome::ok(&record.id, reviewer, !record.is_assigned(reviewer)))
        .collect();

    match mode {
        AssignmentMode::Union => {
            record
                .assigned_reviewers
                .extend(requested.into_iter().map(str::to_string));
        }
        AssignmentMode::Replace => {
            record.assigned_reviewers = requested.into_iter().map(str::to_string).collect();
        }
    }
    outcomes
}

/// Category pool assignment for one abstract.
///
/// Returns `None` when the abstract has no category or the category has no
/// reviewer pool, so callers can count it as skipped.
pub fn auto_assign(record: &mut Abstract, settings: &AbstractSettings) -> Option<Vec<PairOutcome>> {
    let category = settings.category(record.category.as_deref()?)?;
    if category.reviewer_ids.is_empty() {
        return None;
    }
    Some(assign(record, &category.reviewer_ids, AssignmentMode::Union))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abstracts::event::Category;
    use crate::abstracts::model::fixtures::sample;
    use crate::abstracts::model::AbstractStatus;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn assigning_twice_is_idempotent() {
        let mut record = sample("a1", AbstractStatus::Pending);
        let first = assign(&mut record, &ids(&["rev-1", "rev-2"]), AssignmentMode::Union);
        assert!(first.iter().all(|p| p.success && p.newly_assigned));

        let snapshot = record.assigned_reviewers.clone();
        let second = assign(&mut record, &ids(&["rev-1"]), AssignmentMode::Union);
        assert_eq!(second, vec![PairOutcome::ok("a1", "rev-1", false)]);
        assert_eq!(record.assigned_reviewers, snapshot);
    }

    #[test]
    fn replace_drops_unlisted_reviewers() {
        let mut record = sample("a1", AbstractStatus::UnderReview);
        assign(&mut record, &ids(&["rev-1", "rev-2"]), AssignmentMode::Union);

        let outcomes = assign(&mut record, &ids(&["rev-2", "rev-3"]), AssignmentMode::Replace);
        assert_eq!(
            record.assigned_reviewers.iter().collect::<Vec<_>>(),
            vec!["rev-2", "rev-3"]
        );
        assert!(!outcomes[0].newly_assigned);
        assert!(outcomes[1].newly_assigned);
    }

    #[test]
    fn failed_pairs_match_assigned_pairs() {
        let reviewers = ids(&["rev-1", " rev-1 ", "rev-2", ""]);
        let mut record = sample("a1", AbstractStatus::Pending);

        let assigned = assign(&mut record, &reviewers, AssignmentMode::Union);
        let failed = fail_pairs("a1", &reviewers, "Abstract not found: a1");

        assert_eq!(assigned.len(), 2);
        assert_eq!(failed.len(), assigned.len());
        assert_eq!(failed[0].reviewer_id, "rev-1");
        assert!(failed.iter().all(|p| !p.success && !p.newly_assigned));
    }

    #[test]
    fn empty_selection_is_rejected() {
        assert!(ensure_selection(&[], &ids(&["rev-1"])).is_err());
        assert!(ensure_selection(&ids(&["a1"]), &ids(&[" "])).is_err());
        assert!(ensure_selection(&ids(&["a1"]), &ids(&["rev-1"])).is_ok());
    }

    #[test]
    fn auto_assign_uses_category_pool() {
        let settings = AbstractSettings {
            categories: vec![
                Category {
                    id: "cat-cardio".into(),
                    name: "Cardiology".into(),
                    sub_topics: vec![],
                    reviewer_ids: ids(&["rev-7", "rev-8"]),
                },
                Category {
                    id: "cat-empty".into(),
                    name: "Empty".into(),
                    sub_topics: vec![],
                    reviewer_ids: vec![],
                },
            ],
            ..AbstractSettings::default()
        };

        let mut record = sample("a1", AbstractStatus::Submitted);
        let outcomes = auto_assign(&mut record, &settings).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(record.is_assigned("rev-7") && record.is_assigned("rev-8"));

        let mut unpooled = sample("a2", AbstractStatus::Submitted);
        unpooled.category = Some("cat-empty".into());
        assert!(auto_assign(&mut unpooled, &settings).is_none());

        unpooled.category = None;
        assert!(auto_assign(&mut unpooled, &settings).is_none());
    }
}
