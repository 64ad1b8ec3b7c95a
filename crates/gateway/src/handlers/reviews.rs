//! Reviewer decisions

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::load_abstract;
use crate::AppState;
use atlas_common::{
    abstracts::{record_review, Abstract, ReviewInput, ReviewUpsert},
    auth::{AuthContext, Role},
    envelope::ApiEnvelope,
    errors::Result,
    metrics,
};

/// Record the caller's review; a second submission replaces the first
pub async fn submit_review(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((event_id, aid)): Path<(String, String)>,
    Json(review): Json<ReviewInput>,
) -> Result<ApiEnvelope<Abstract>> {
    auth.require_role(&[Role::Reviewer], "review abstracts")?;

    let mut record = load_abstract(&state, &event_id, &aid).await?;
    let outcome = record_review(&mut record, &auth.user_id, review, Utc::now())?;
    state.store.save_abstract(&record).await?;

    let updated = outcome == ReviewUpsert::Updated;
    metrics::record_review(updated);
    tracing::info!(
        event_id = %event_id,
        abstract_id = %aid,
        reviewer_id = %auth.user_id,
        updated,
        "Review recorded"
    );

    let message = if updated { "Review updated" } else { "Review submitted" };
    Ok(ApiEnvelope::ok(record).with_message(message))
}
