//! Authentication and authorization utilities
//!
//! Provides:
//! - Actor roles (admin, event manager, reviewer, registrant, author)
//! - JWT token generation and validation
//! - Request auth context extraction

use crate::errors::{AppError, Result};
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Role an authenticated actor holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Admin,
    EventManager,
    Reviewer,
    Registrant,
    Author,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::EventManager => "event-manager",
            Role::Reviewer => "reviewer",
            Role::Registrant => "registrant",
            Role::Author => "author",
        }
    }

    /// Organizer roles that manage reviews and decisions
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::EventManager)
    }

    /// Roles that own submissions
    pub fn is_submitter(&self) -> bool {
        matches!(self, Role::Registrant | Role::Author)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "event-manager" => Ok(Role::EventManager),
            "reviewer" => Ok(Role::Reviewer),
            "registrant" => Ok(Role::Registrant),
            "author" => Ok(Role::Author),
            other => Err(AppError::InvalidFormat {
                message: format!("Unknown role: {}", other),
            }),
        }
    }
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User, registration or author-account ID
    pub user_id: String,

    /// Role carried by the token
    pub role: Role,

    /// Display name, when the token carries one
    pub name: Option<String>,

    /// Email, when the token carries one
    pub email: Option<String>,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// Check if the context holds one of the given roles
    pub fn has_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }

    /// Require one of the given roles, returning error if not present
    pub fn require_role(&self, roles: &[Role], action: &str) -> Result<()> {
        if self.has_role(roles) {
            Ok(())
        } else {
            Err(AppError::InsufficientRole {
                role: self.role.to_string(),
                action: action.to_string(),
            })
        }
    }

    /// Require an organizer role
    pub fn require_staff(&self, action: &str) -> Result<()> {
        self.require_role(&[Role::Admin, Role::EventManager], action)
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Actor role
    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(
        &self,
        user_id: &str,
        role: Role,
        name: Option<String>,
        email: Option<String>,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            role,
            name,
            email,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Extract the token from a `Bearer` Authorization header
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Axum extractor for AuthContext
///
/// Expects an `Arc<JwtManager>` in the request extensions (installed by the
/// router as an `Extension` layer).
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        // Extract request ID
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let manager = parts
            .extensions
            .get::<Arc<JwtManager>>()
            .cloned()
            .ok_or_else(|| AppError::Configuration {
                message: "JWT manager not installed".to_string(),
            })?;

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must use the Bearer scheme".to_string(),
        })?;

        let claims = manager.validate_token(token)?;

        Ok(AuthContext {
            user_id: claims.sub,
            role: claims.role,
            name: claims.name,
            email: claims.email,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("abc.def"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let token = manager
            .generate_token("reg-42", Role::Registrant, Some("Ada".into()), None)
            .unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "reg-42");
        assert_eq!(claims.role, Role::Registrant);
        assert_eq!(claims.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = JwtManager::new("one", 3600)
            .generate_token("u1", Role::Admin, None, None)
            .unwrap();
        let err = JwtManager::new("two", 3600).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn test_role_checks() {
        let ctx = AuthContext {
            user_id: "u1".into(),
            role: Role::Reviewer,
            name: None,
            email: None,
            request_id: "r1".into(),
        };
        assert!(ctx.require_staff("assign reviewers").is_err());
        assert!(ctx.require_role(&[Role::Reviewer], "review").is_ok());
        assert_eq!("event-manager".parse::<Role>().unwrap(), Role::EventManager);
        assert!("superuser".parse::<Role>().is_err());
    }
}
