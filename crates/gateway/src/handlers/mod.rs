//! API handlers module

pub mod abstracts;
pub mod assignment;
pub mod export;
pub mod health;
pub mod reviews;
pub mod settings;

use crate::AppState;
use atlas_common::{
    abstracts::{Abstract, AbstractSettings},
    auth::{AuthContext, Role},
    errors::{AppError, Result},
};

/// Load an abstract of `event_id` or fail with `AbstractNotFound`
pub(crate) async fn load_abstract(state: &AppState, event_id: &str, id: &str) -> Result<Abstract> {
    state
        .store
        .find_abstract(event_id, id)
        .await?
        .ok_or_else(|| AppError::AbstractNotFound { id: id.to_string() })
}

/// Settings of an event that has been configured
pub(crate) async fn load_settings(state: &AppState, event_id: &str) -> Result<AbstractSettings> {
    state
        .store
        .find_settings(event_id)
        .await?
        .ok_or_else(|| AppError::EventNotFound {
            id: event_id.to_string(),
        })
}

/// Staff see everything, reviewers what they are assigned to, submitters
/// their own abstracts
pub(crate) fn can_view(auth: &AuthContext, record: &Abstract) -> bool {
    match auth.role {
        Role::Admin | Role::EventManager => true,
        Role::Reviewer => record.is_assigned(&auth.user_id),
        Role::Registrant | Role::Author => record.is_owned_by(&auth.user_id),
    }
}

/// Hide abstracts the caller may not see behind a 404
pub(crate) fn ensure_visible(auth: &AuthContext, record: &Abstract) -> Result<()> {
    if can_view(auth, record) {
        Ok(())
    } else {
        Err(AppError::AbstractNotFound {
            id: record.id.clone(),
        })
    }
}

/// The caller must be the submitter who owns `record`
pub(crate) fn ensure_owner(auth: &AuthContext, record: &Abstract, action: &str) -> Result<()> {
    if auth.role.is_submitter() && record.is_owned_by(&auth.user_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden {
            message: format!("Only the submitter may {}", action),
        })
    }
}
