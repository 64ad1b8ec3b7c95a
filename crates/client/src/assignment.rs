//! Reviewer assignment from the admin side
//!
//! One request assigns every (abstract, reviewer) pair. Afterwards, each
//! abstract that gained a reviewer while `pending` is moved to
//! `under-review` in a separate call whose failure never fails the
//! assignment.

use crate::api::AbstractApi;
use crate::errors::{ClientError, ClientResult};
use crate::session::Session;
use atlas_common::abstracts::assignment::{ensure_selection, fail_pairs};
use atlas_common::abstracts::{
    AbstractStatus, AssignmentMode, AssignmentRequest, PairOutcome, StatusChange,
};
use atlas_common::metrics;
use serde::Serialize;
use std::collections::BTreeSet;

/// A failure tied to one abstract
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemError {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResult {
    /// True iff no pair failed
    pub success: bool,
    pub pairs: Vec<PairOutcome>,
    /// Abstracts moved from `pending` to `under-review`
    pub moved_to_review: Vec<String>,
    pub status_update_failures: Vec<ItemError>,
    pub message: String,
}

impl AssignmentResult {
    pub fn failed_pairs(&self) -> impl Iterator<Item = &PairOutcome> {
        self.pairs.iter().filter(|p| !p.success)
    }
}

fn summarize(pairs: &[PairOutcome]) -> String {
    let failed: Vec<&PairOutcome> = pairs.iter().filter(|p| !p.success).collect();
    match failed.first() {
        None => format!("Assigned reviewers to {} pair(s)", pairs.len()),
        Some(first) => format!(
            "{} of {} assignment(s) failed (first error: {})",
            failed.len(),
            pairs.len(),
            first.message.as_deref().unwrap_or("unknown error")
        ),
    }
}

fn require_assigner(session: &Session) -> ClientResult<()> {
    if session.is_staff() {
        Ok(())
    } else {
        Err(ClientError::Forbidden {
            role: session.role(),
            action: "assign reviewers".to_string(),
        })
    }
}

/// Assign `reviewer_ids` to every abstract in `abstract_ids`.
///
/// Empty selections and non-staff sessions are rejected before any call.
/// A failed request is reported as a failure of every pair rather than an
/// error.
pub async fn assign_reviewers<A>(
    api: &A,
    session: &Session,
    event_id: &str,
    abstract_ids: &[String],
    reviewer_ids: &[String],
    mode: AssignmentMode,
) -> ClientResult<AssignmentResult>
where
    A: AbstractApi + ?Sized,
{
    require_assigner(session)?;
    ensure_selection(abstract_ids, reviewer_ids)?;

    let request = AssignmentRequest {
        abstract_ids: abstract_ids.to_vec(),
        reviewer_ids: reviewer_ids.to_vec(),
        replace: mode == AssignmentMode::Replace,
    };

    let report = match api.assign_reviewers(session, event_id, &request).await {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(event_id, error = %err, "Reviewer assignment request failed");
            let message = err.user_message();
            let pairs = abstract_ids
                .iter()
                .flat_map(|a| fail_pairs(a, reviewer_ids, &message))
                .collect::<Vec<_>>();
            metrics::record_assignments(0, pairs.len());
            return Ok(AssignmentResult {
                success: false,
                message: summarize(&pairs),
                pairs,
                ..AssignmentResult::default()
            });
        }
    };

    let succeeded = report.pairs.iter().filter(|p| p.success).count();
    metrics::record_assignments(succeeded, report.pairs.len() - succeeded);

    let gained: BTreeSet<&str> = report
        .pairs
        .iter()
        .filter(|p| p.success && p.newly_assigned)
        .map(|p| p.abstract_id.as_str())
        .collect();

    let mut moved_to_review = Vec::new();
    let mut status_update_failures = Vec::new();

    for state in report
        .abstracts
        .iter()
        .filter(|a| a.status == AbstractStatus::Pending && gained.contains(a.id.as_str()))
    {
        let change = StatusChange {
            status: AbstractStatus::UnderReview,
            reason: None,
        };
        match api.update_status(session, event_id, &state.id, &change).await {
            Ok(_) => moved_to_review.push(state.id.clone()),
            Err(err) => {
                tracing::warn!(
                    event_id,
                    abstract_id = %state.id,
                    error = %err,
                    "Assigned reviewers but could not move abstract to under-review"
                );
                status_update_failures.push(ItemError {
                    id: state.id.clone(),
                    message: err.user_message(),
                });
            }
        }
    }

    tracing::info!(
        event_id,
        pairs = report.pairs.len(),
        failed = report.pairs.len() - succeeded,
        moved = moved_to_review.len(),
        "Reviewer assignment finished"
    );

    Ok(AssignmentResult {
        success: report.success(),
        message: summarize(&report.pairs),
        pairs: report.pairs,
        moved_to_review,
        status_update_failures,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignOutcome {
    pub success: bool,
    pub message: String,
}

/// Server-side category-pool assignment; never returns `Err`
pub async fn auto_assign_reviewers<A>(api: &A, session: &Session, event_id: &str) -> AutoAssignOutcome
where
    A: AbstractApi + ?Sized,
{
    if let Err(err) = require_assigner(session) {
        return AutoAssignOutcome {
            success: false,
            message: err.user_message(),
        };
    }

    match api.auto_assign_reviewers(session, event_id).await {
        Ok(report) => AutoAssignOutcome {
            success: true,
            message: format!(
                "Assigned reviewers to {} abstract(s); {} skipped without a category pool",
                report.assigned_abstracts, report.skipped_abstracts
            ),
        },
        Err(err) => {
            tracing::warn!(event_id, error = %err, "Automatic reviewer assignment failed");
            AutoAssignOutcome {
                success: false,
                message: err.user_message(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockAbstractApi;
    use crate::testing::{abstract_with, ids};
    use atlas_common::abstracts::{AbstractSettings, Category};
    use atlas_common::auth::Role;

    fn admin() -> Session {
        Session::new(Role::Admin, "token").with_user("admin-1")
    }

    #[tokio::test]
    async fn pending_abstract_moves_to_review() {
        let api = MockAbstractApi::new().with_abstracts([
            abstract_with("a1", AbstractStatus::Pending),
            abstract_with("a2", AbstractStatus::Submitted),
        ]);

        let result = assign_reviewers(
            &api,
            &admin(),
            "evt-1",
            &ids(&["a1", "a2"]),
            &ids(&["rev-1"]),
            AssignmentMode::Union,
        )
        .await
        .unwrap();

        assert!(result.success);
        assert_eq!(result.pairs.len(), 2);
        assert_eq!(result.moved_to_review, ["a1"]);
        assert_eq!(api.record("a1").unwrap().status, AbstractStatus::UnderReview);
        assert_eq!(api.record("a2").unwrap().status, AbstractStatus::Submitted);
    }

    #[tokio::test]
    async fn status_update_failure_does_not_fail_assignment() {
        let api = MockAbstractApi::new().with_abstracts([abstract_with("a1", AbstractStatus::Pending)]);
        api.fail_status_update("a1", "Status service unavailable");

        let result = assign_reviewers(&api, &admin(), "evt-1", &ids(&["a1"]), &ids(&["rev-1"]), AssignmentMode::Union)
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.moved_to_review.is_empty());
        assert_eq!(result.status_update_failures[0].message, "Status service unavailable");
        assert!(api.record("a1").unwrap().is_assigned("rev-1"));
    }

    #[tokio::test]
    async fn reassignment_skips_status_step() {
        let mut record = abstract_with("a1", AbstractStatus::Pending);
        record.assigned_reviewers.insert("rev-1".into());
        let api = MockAbstractApi::new().with_abstracts([record]);

        let result = assign_reviewers(&api, &admin(), "evt-1", &ids(&["a1"]), &ids(&["rev-1"]), AssignmentMode::Union)
            .await
            .unwrap();

        assert!(result.success);
        assert!(!result.pairs[0].newly_assigned);
        assert!(api.status_calls().is_empty());
        assert_eq!(api.record("a1").unwrap().assigned_reviewers.len(), 1);
    }

    #[tokio::test]
    async fn partial_failure_keeps_successful_pairs() {
        let api = MockAbstractApi::new().with_abstracts([
            abstract_with("a1", AbstractStatus::Submitted),
            abstract_with("a2", AbstractStatus::Submitted),
        ]);
        api.fail_assignment("a2", "Abstract is locked");

        let result = assign_reviewers(
            &api,
            &admin(),
            "evt-1",
            &ids(&["a1", "a2"]),
            &ids(&["rev-1", "rev-2"]),
            AssignmentMode::Union,
        )
        .await
        .unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_pairs().count(), 2);
        assert!(result.message.contains("Abstract is locked"));
        assert_eq!(api.record("a1").unwrap().assigned_reviewers.len(), 2);
    }

    #[tokio::test]
    async fn empty_selection_and_wrong_role_rejected_before_call() {
        let api = MockAbstractApi::new();
        api.set_offline(true);

        let err = assign_reviewers(&api, &admin(), "evt-1", &[], &ids(&["rev-1"]), AssignmentMode::Union)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let reviewer = Session::new(Role::Reviewer, "t").with_user("rev-1");
        let err = assign_reviewers(&api, &reviewer, "evt-1", &ids(&["a1"]), &ids(&["rev-1"]), AssignmentMode::Union)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn transport_failure_marks_every_pair() {
        let api = MockAbstractApi::new();
        api.set_offline(true);

        let result = assign_reviewers(&api, &admin(), "evt-1", &ids(&["a1", "a2"]), &ids(&["rev-1"]), AssignmentMode::Union)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.failed_pairs().count(), 2);
    }

    #[tokio::test]
    async fn replace_mode_sets_exact_reviewers() {
        let mut record = abstract_with("a1", AbstractStatus::UnderReview);
        record.assigned_reviewers.insert("rev-1".into());
        let api = MockAbstractApi::new().with_abstracts([record]);

        assign_reviewers(&api, &admin(), "evt-1", &ids(&["a1"]), &ids(&["rev-2"]), AssignmentMode::Replace)
            .await
            .unwrap();

        let stored = api.record("a1").unwrap();
        assert!(!stored.is_assigned("rev-1"));
        assert!(stored.is_assigned("rev-2"));
    }

    #[tokio::test]
    async fn auto_assign_reports_counts() {
        let mut uncategorized = abstract_with("a2", AbstractStatus::Submitted);
        uncategorized.category = None;
        let api = MockAbstractApi::new()
            .with_settings(AbstractSettings {
                categories: vec![Category {
                    id: "cat-cardio".into(),
                    name: "Cardiology".into(),
                    sub_topics: vec![],
                    reviewer_ids: ids(&["rev-5"]),
                }],
                ..AbstractSettings::default()
            })
            .with_abstracts([abstract_with("a1", AbstractStatus::Submitted), uncategorized]);

        let outcome = auto_assign_reviewers(&api, &admin(), "evt-1").await;
        assert!(outcome.success);
        assert!(outcome.message.contains("1 abstract(s); 1 skipped"));
        assert!(api.record("a1").unwrap().is_assigned("rev-5"));

        api.set_offline(true);
        let outcome = auto_assign_reviewers(&api, &admin(), "evt-1").await;
        assert!(!outcome.success);
    }
}
