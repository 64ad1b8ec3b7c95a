//! Client-side error classification
//!
//! Every failure falls in one of four buckets: local validation, transport,
//! a server-reported business error, or a response that does not follow the
//! envelope contract.

use atlas_common::auth::Role;
use atlas_common::errors::{AppError, FieldErrors};
use thiserror::Error;

/// Shown for transport failures instead of the raw error
pub const NETWORK_ERROR_MESSAGE: &str = "Unable to reach the server. Please try again.";

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected before any request was sent
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// The session's role may not perform the action
    #[error("Role {role} cannot {action}")]
    Forbidden { role: Role, action: String },

    #[error("Transport error: {0}")]
    Transport(String),

    /// `{success: false}` envelope or non-2xx status
    #[error("{message}")]
    Server { status: Option<u16>, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        ClientError::Validation(errors)
    }

    /// Text for an alert or toast. Server messages are shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation(errors) => errors
                .first_message()
                .unwrap_or("Please correct the highlighted fields")
                .to_string(),
            ClientError::Forbidden { action, .. } => {
                format!("You do not have permission to {}", action)
            }
            ClientError::Transport(_) => NETWORK_ERROR_MESSAGE.to_string(),
            ClientError::Server { message, .. } => message.clone(),
            ClientError::MalformedResponse(_) => {
                "The server returned an unexpected response".to_string()
            }
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

impl From<FieldErrors> for ClientError {
    fn from(errors: FieldErrors) -> Self {
        ClientError::Validation(errors)
    }
}

/// Local rule checks reuse the shared domain errors
impl From<AppError> for ClientError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::InvalidFields(errors) => ClientError::Validation(errors),
            AppError::Validation { message, field } => {
                ClientError::validation(field.as_deref().unwrap_or("form"), &message)
            }
            other => ClientError::Server {
                status: Some(other.status_code().as_u16()),
                message: other.to_string(),
            },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::MalformedResponse(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
