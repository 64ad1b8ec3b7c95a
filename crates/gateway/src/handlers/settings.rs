//! Per-event abstract settings

use axum::{
    extract::{Path, State},
    Json,
};

use std::collections::HashSet;

use super::load_settings;
use crate::AppState;
use atlas_common::{
    abstracts::AbstractSettings,
    auth::AuthContext,
    envelope::ApiEnvelope,
    errors::{AppError, Result},
};

fn validate(settings: &AbstractSettings) -> Result<()> {
    if let (Some(opens), Some(closes)) = (settings.window.opens_at, settings.window.closes_at) {
        if opens > closes {
            return Err(AppError::Validation {
                message: "Submission window must open before it closes".to_string(),
                field: Some("window".to_string()),
            });
        }
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = settings.categories.iter().find(|c| !seen.insert(c.id.as_str())) {
        return Err(AppError::Validation {
            message: format!("Duplicate category id: {}", duplicate.id),
            field: Some("categories".to_string()),
        });
    }
    Ok(())
}

/// Any authenticated caller may read the settings
pub async fn get_settings(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(event_id): Path<String>,
) -> Result<ApiEnvelope<AbstractSettings>> {
    let settings = load_settings(&state, &event_id).await?;
    Ok(ApiEnvelope::ok(settings))
}

pub async fn put_settings(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(event_id): Path<String>,
    Json(settings): Json<AbstractSettings>,
) -> Result<ApiEnvelope<AbstractSettings>> {
    auth.require_staff("change abstract settings")?;

    validate(&settings)?;

    state.store.save_settings(&event_id, &settings).await?;
    tracing::info!(
        event_id = %event_id,
        categories = settings.categories.len(),
        enabled = settings.enabled,
        "Abstract settings saved"
    );
    Ok(ApiEnvelope::ok(settings).with_message("Settings saved"))
}
