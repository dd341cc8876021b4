use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::policy::PolicyViolation;

pub type AuthResult<T> = Result<T, AuthError>;

/// Outcome tags shared by every orchestrator; the HTTP boundary maps them to
/// statuses in `into_response`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    /// Unknown, expired or already redeemed verification/reset token.
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("{0}")]
    NotFound(String),
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn invalid_credentials() -> Self {
        Self::Unauthorized("invalid credentials".into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) | AuthError::Policy(_) | AuthError::InvalidToken => {
                StatusCode::BAD_REQUEST
            }
            AuthError::Conflict(_) => StatusCode::CONFLICT,
            AuthError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AuthError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AuthError::from(PolicyViolation::TooCommon).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AuthError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::invalid_credentials().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::InvalidToken.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AuthError::Internal(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn policy_message_is_the_rule() {
        let err = AuthError::from(PolicyViolation::MissingDigit);
        assert_eq!(err.to_string(), "password must contain at least one number");
    }
}
