//! Authentication Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::api::response::{error_response, ErrorBody};
use crate::db::StoreError;

/// Authentication error types.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Malformed request (bad JSON, bad path parameter).
    #[error("{0}")]
    BadRequest(String),

    /// Field-level validation failure.
    #[error("{0}")]
    Validation(String),

    /// Missing Authorization header.
    #[error("Authorization header required")]
    MissingAuthHeader,

    /// Authorization header is not `Bearer <token>`.
    #[error("Invalid authorization header format")]
    InvalidAuthHeader,

    /// Bad signature, wrong algorithm, not yet valid, or unknown subject.
    #[error("Invalid token")]
    InvalidToken,

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Unknown email or wrong password. Deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Role gate reached without a resolved identity.
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Role not in the gate's whitelist.
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    /// User not found.
    #[error("User not found")]
    UserNotFound,

    /// No route matches the request path.
    #[error("Resource not found")]
    NotFound,

    /// Path matches but the method is not served there.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Email already registered.
    #[error("User with this email already exists")]
    UserAlreadyExists,

    /// Password hashing error.
    #[error("Password processing failed")]
    PasswordHash,

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Token encoding error.
    #[error("Token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    /// Internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AuthError {
    /// HTTP status and machine-readable kind.
    pub const fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED"),
            Self::MissingAuthHeader | Self::InvalidAuthHeader | Self::AuthenticationRequired => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            Self::InsufficientPermissions => (StatusCode::FORBIDDEN, "INSUFFICIENT_PERMISSIONS"),
            Self::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND"),
            Self::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            Self::UserAlreadyExists => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
            Self::PasswordHash | Self::Database(_) | Self::Jwt(_) | Self::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            Self::PasswordHash | Self::Database(_) | Self::Jwt(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => Self::UserAlreadyExists,
            StoreError::Database(e) => Self::Database(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();

        if status.is_server_error() {
            // The request span carries the request id.
            error!(error = %self, kind, "Request failed");
        }

        error_response(
            status,
            ErrorBody {
                code: status.as_u16(),
                kind,
                message: self.public_message(),
            },
        )
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AuthError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AuthError::MissingAuthHeader, StatusCode::UNAUTHORIZED),
            (AuthError::TokenExpired, StatusCode::UNAUTHORIZED),
            (AuthError::InsufficientPermissions, StatusCode::FORBIDDEN),
            (AuthError::UserNotFound, StatusCode::NOT_FOUND),
            (AuthError::NotFound, StatusCode::NOT_FOUND),
            (AuthError::MethodNotAllowed, StatusCode::METHOD_NOT_ALLOWED),
            (AuthError::UserAlreadyExists, StatusCode::CONFLICT),
            (AuthError::PasswordHash, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_and_kind().0, expected, "{err:?}");
        }
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = AuthError::Internal("connection refused at 10.0.0.3".into());
        assert_eq!(err.public_message(), "Internal server error");

        let err = AuthError::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_duplicate_email_maps_to_conflict() {
        let err: AuthError = StoreError::DuplicateEmail.into();
        assert!(matches!(err, AuthError::UserAlreadyExists));
    }
}
