//! Manual and automatic reviewer assignment

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::load_settings;
use crate::AppState;
use atlas_common::{
    abstracts::{
        assignment::{self, ensure_selection, fail_pairs},
        AssignedAbstract, AssignmentReport, AssignmentRequest, AutoAssignReport,
    },
    auth::AuthContext,
    envelope::ApiEnvelope,
    errors::Result,
    metrics,
};

/// Assign every reviewer to every selected abstract. Pairs succeed or fail
/// on their own; nothing is rolled back.
pub async fn assign_reviewers(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(event_id): Path<String>,
    Json(request): Json<AssignmentRequest>,
) -> Result<ApiEnvelope<AssignmentReport>> {
    auth.require_staff("assign reviewers")?;
    ensure_selection(&request.abstract_ids, &request.reviewer_ids)?;

    let mode = request.mode();
    let mut report = AssignmentReport::default();

    for abstract_id in &request.abstract_ids {
        let fail_all = |message: String| fail_pairs(abstract_id, &request.reviewer_ids, &message);

        let mut record = match state.store.find_abstract(&event_id, abstract_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                report
                    .pairs
                    .extend(fail_all(format!("Abstract not found: {}", abstract_id)));
                continue;
            }
            Err(e) => {
                tracing::warn!(abstract_id = %abstract_id, error = %e, "Failed to load abstract for assignment");
                report.pairs.extend(fail_all(e.to_string()));
                continue;
            }
        };

        let pairs = assignment::assign(&mut record, &request.reviewer_ids, mode);
        record.updated_at = Utc::now();

        match state.store.save_abstract(&record).await {
            Ok(()) => {
                report.pairs.extend(pairs);
                report.abstracts.push(AssignedAbstract {
                    id: record.id.clone(),
                    status: record.status,
                    reviewer_count: record.assigned_reviewers.len(),
                });
            }
            Err(e) => {
                tracing::warn!(abstract_id = %abstract_id, error = %e, "Failed to save assignment");
                report.pairs.extend(fail_all(e.to_string()));
            }
        }
    }

    let succeeded = report.pairs.iter().filter(|p| p.success).count();
    let failed = report.pairs.len() - succeeded;
    metrics::record_assignments(succeeded, failed);

    tracing::info!(
        event_id = %event_id,
        mode = ?mode,
        succeeded,
        failed,
        "Reviewer assignment finished"
    );

    let message = if failed == 0 {
        format!("Assigned reviewers to {} pair(s)", succeeded)
    } else {
        format!("{} of {} assignment(s) failed", failed, report.pairs.len())
    };
    Ok(ApiEnvelope::ok(report).with_message(message))
}

/// Add each category's reviewer pool to the abstracts filed under it
pub async fn auto_assign(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(event_id): Path<String>,
) -> Result<ApiEnvelope<AutoAssignReport>> {
    auth.require_staff("auto-assign reviewers")?;

    let settings = load_settings(&state, &event_id).await?;
    let mut report = AutoAssignReport::default();

    for mut record in state.store.list_abstracts(&event_id).await? {
        let Some(pairs) = assignment::auto_assign(&mut record, &settings) else {
            report.skipped_abstracts += 1;
            continue;
        };
        let added = pairs.iter().filter(|p| p.newly_assigned).count();
        if added > 0 {
            record.updated_at = Utc::now();
            state.store.save_abstract(&record).await?;
        }
        report.assigned_abstracts += 1;
        report.new_assignments += added;
    }

    metrics::record_assignments(report.new_assignments, 0);
    tracing::info!(
        event_id = %event_id,
        assigned = report.assigned_abstracts,
        skipped = report.skipped_abstracts,
        new_assignments = report.new_assignments,
        "Automatic assignment finished"
    );

    let message = format!(
        "Auto-assigned reviewers to {} abstract(s), {} skipped",
        report.assigned_abstracts, report.skipped_abstracts
    );
    Ok(ApiEnvelope::ok(report).with_message(message))
}
