//! Bulk status transitions
//!
//! One status call per abstract. A failure is recorded against its id and
//! the run continues; nothing is rolled back.

use crate::api::AbstractApi;
use crate::assignment::ItemError;
use crate::errors::ClientError;
use crate::session::Session;
use atlas_common::abstracts::{AbstractStatus, StatusChange};
use atlas_common::metrics;
use futures::stream::{self, StreamExt};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResult {
    pub success_count: usize,
    pub failed_count: usize,
    /// In input order
    pub errors: Vec<ItemError>,
}

impl BulkResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed_count == 0
    }

    /// "N succeeded, M failed (first error: ...)"
    pub fn summary(&self) -> String {
        match self.errors.first() {
            None => format!("{} succeeded, 0 failed", self.success_count),
            Some(first) => format!(
                "{} succeeded, {} failed (first error: {})",
                self.success_count, self.failed_count, first.message
            ),
        }
    }
}

/// Move every abstract in `ids` to `target`.
///
/// With the API's bulk concurrency at 1 the calls run strictly one after
/// another; higher values keep that many in flight. Either way each error
/// stays attached to its id and the errors are reported in input order.
pub async fn bulk_transition<A>(
    api: &A,
    session: &Session,
    event_id: &str,
    ids: &[String],
    target: AbstractStatus,
) -> BulkResult
where
    A: AbstractApi + ?Sized,
{
    let change = StatusChange {
        status: target,
        reason: None,
    };

    let concurrency = api.bulk_concurrency();
    let mut outcomes: Vec<(usize, Result<(), ClientError>)> = if concurrency <= 1 {
        let mut outcomes = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            let outcome = api.update_status(session, event_id, id, &change).await.map(|_| ());
            outcomes.push((index, outcome));
        }
        outcomes
    } else {
        stream::iter(ids.iter().enumerate())
            .map(|(index, id)| {
                let change = &change;
                async move {
                    let outcome = api.update_status(session, event_id, id, change).await.map(|_| ());
                    (index, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    };
    outcomes.sort_by_key(|(index, _)| *index);

    let mut result = BulkResult::default();
    for (index, outcome) in outcomes {
        match outcome {
            Ok(()) => result.success_count += 1,
            Err(err) => {
                tracing::warn!(
                    event_id,
                    abstract_id = %ids[index],
                    target = %target,
                    error = %err,
                    "Bulk status update failed"
                );
                result.failed_count += 1;
                result.errors.push(ItemError {
                    id: ids[index].clone(),
                    message: err.user_message(),
                });
            }
        }
    }

    metrics::record_bulk(result.success_count, result.failed_count);
    tracing::info!(
        event_id,
        target = %target,
        succeeded = result.success_count,
        failed = result.failed_count,
        "Bulk transition finished"
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockAbstractApi;
    use crate::testing::{abstract_with, ids};
    use atlas_common::auth::Role;

    fn api() -> MockAbstractApi {
        let api = MockAbstractApi::new().with_abstracts([
            abstract_with("a1", AbstractStatus::UnderReview),
            abstract_with("a2", AbstractStatus::UnderReview),
            abstract_with("a3", AbstractStatus::UnderReview),
        ]);
        api.fail_status_update("a2", "Abstract is locked");
        api
    }

    fn admin() -> Session {
        Session::new(Role::Admin, "token")
    }

    #[tokio::test]
    async fn middle_failure_does_not_stop_the_run() {
        let api = api();
        let result = bulk_transition(
            &api,
            &admin(),
            "evt-1",
            &ids(&["a1", "a2", "a3"]),
            AbstractStatus::Approved,
        )
        .await;

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.errors[0].id, "a2");
        assert_eq!(api.record("a1").unwrap().status, AbstractStatus::Approved);
        assert_eq!(api.record("a2").unwrap().status, AbstractStatus::UnderReview);
        assert_eq!(api.record("a3").unwrap().status, AbstractStatus::Approved);

        let order: Vec<String> = api.status_calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, ["a1", "a2", "a3"]);
        assert_eq!(result.summary(), "2 succeeded, 1 failed (first error: Abstract is locked)");
    }

    #[tokio::test]
    async fn bounded_concurrency_keeps_attribution() {
        let api = api().with_bulk_concurrency(3);
        api.fail_status_update("a3", "Abstract was deleted");

        let result = bulk_transition(
            &api,
            &admin(),
            "evt-1",
            &ids(&["a1", "a2", "a3"]),
            AbstractStatus::Rejected,
        )
        .await;

        assert_eq!(result.success_count, 1);
        let failed: Vec<&str> = result.errors.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(failed, ["a2", "a3"]);
        assert_eq!(result.errors[1].message, "Abstract was deleted");
    }

    #[tokio::test]
    async fn unknown_ids_are_counted_as_failures() {
        let api = api();
        let result = bulk_transition(&api, &admin(), "evt-1", &ids(&["a1", "zz"]), AbstractStatus::Accepted).await;
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failed_count, 1);
        assert!(!result.all_succeeded());
    }

    #[test]
    fn empty_selection_is_a_clean_no_op() {
        let api = api().with_bulk_concurrency(4);
        let result = tokio_test::block_on(bulk_transition(
            &api,
            &admin(),
            "evt-1",
            &[],
            AbstractStatus::Approved,
        ));
        assert_eq!(result, BulkResult::default());
        assert_eq!(result.summary(), "0 succeeded, 0 failed");
        assert!(api.status_calls().is_empty());
    }
}
