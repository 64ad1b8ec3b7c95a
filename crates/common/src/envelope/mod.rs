//! `{success, message?, data?}` response envelope
//!
//! Failures use the same outer shape (see [`crate::errors::ErrorResponse`]),
//! so a consumer only needs `success` to branch.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

impl ApiEnvelope<()> {
    /// Success without a payload
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiEnvelope<T> {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::BAD_REQUEST
        };
        (status, Json(self)).into_response()
    }
}

/// Wraps an envelope with an explicit status, e.g. `201 Created`
pub struct WithStatus<T>(pub StatusCode, pub ApiEnvelope<T>);

impl<T: Serialize> IntoResponse for WithStatus<T> {
    fn into_response(self) -> Response {
        (self.0, Json(self.1)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_envelope_shape() {
        let env = ApiEnvelope::ok(json!({"id": "a1"})).with_message("Abstract created");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"success": true, "message": "Abstract created", "data": {"id": "a1"}})
        );
    }

    #[test]
    fn message_only_omits_data() {
        let env = ApiEnvelope::message("Deleted");
        assert_eq!(
            serde_json::to_value(&env).unwrap(),
            json!({"success": true, "message": "Deleted"})
        );
    }

    #[test]
    fn failure_status_code() {
        let response = ApiEnvelope::<()>::failure("nope").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = WithStatus(StatusCode::CREATED, ApiEnvelope::ok(1)).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
