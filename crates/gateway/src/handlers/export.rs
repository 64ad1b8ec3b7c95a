//! Abstract export download

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use std::time::Instant;

use crate::AppState;
use atlas_common::{
    abstracts::Abstract,
    auth::AuthContext,
    errors::Result,
    export::{attachment_disposition, render_csv, ExportFilters},
    metrics,
};

/// Render the filtered abstracts as a CSV attachment
pub async fn download(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(event_id): Path<String>,
    Query(filters): Query<ExportFilters>,
) -> Result<Response> {
    auth.require_staff("export abstracts")?;
    filters.validate()?;

    let mode = filters.mode();
    let started = Instant::now();

    let categories = state
        .store
        .find_settings(&event_id)
        .await?
        .map(|s| s.categories)
        .unwrap_or_default();
    let records = state.store.list_abstracts(&event_id).await?;
    let selected: Vec<&Abstract> = records.iter().filter(|r| filters.matches(r)).collect();

    let csv = match render_csv(&selected, &categories, mode) {
        Ok(csv) => csv,
        Err(e) => {
            metrics::record_export(started.elapsed().as_secs_f64(), mode.as_str(), false);
            return Err(e);
        }
    };

    let filename = format!("abstracts_{}_{}.csv", event_id, mode);
    metrics::record_export(started.elapsed().as_secs_f64(), mode.as_str(), true);
    tracing::info!(
        event_id = %event_id,
        mode = %mode,
        rows = selected.len(),
        "Export generated"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(&filename)),
        ],
        csv,
    )
        .into_response())
}
